//! argon2 方案
//!
//! PHC 格式：`$argon2id$v=19$m=65536,t=2,p=1$salt$hash`，支持
//! argon2id / argon2i / argon2d 三个变体。cost 参数映射：rounds = t，
//! m 与 p 由 genconfig 取 crate 默认值，验证旧哈希时照单全收。
//!
//! 解析复用 `password-hash` 的 PHC 解析器，计算走 `argon2` crate 的
//! `hash_password_into`，序列化由本模块自己重建以保证字节级往返。

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use password_hash::PasswordHash;

use crate::backend::BackendInfo;
use crate::codec::{HashRecord, ParamValue};
use crate::error::{Error, Result};
use crate::handler::{
    CostScale, Handler, HandlerDescriptor, RoundsSpec, SaltSpec, SchemePolicy, consteq,
    generate_salt_bytes, required_rounds_policy, validate_secret,
};

pub static ARGON2: Argon2Handler = Argon2Handler {
    desc: &HandlerDescriptor {
        scheme_id: "argon2",
        idents: &["$argon2id$", "$argon2i$", "$argon2d$"],
        salt: Some(SaltSpec {
            min_len: 8,
            max_len: 64,
            default_len: 16,
        }),
        rounds: Some(RoundsSpec {
            min: 1,
            max: 1024,
            default: 4,
            scale: CostScale::Linear,
        }),
        checksum_len: 0,
        truncate_size: None,
    },
};

/// 输出摘要长度（字节）
const TAG_LEN: usize = 32;

static AVAILABLE: std::sync::OnceLock<bool> = std::sync::OnceLock::new();

// 内核自检：一次完整的 hash + verify 往返
fn self_test() -> bool {
    let params = match Params::new(64, 2, 1, Some(TAG_LEN)) {
        Ok(p) => p,
        Err(_) => return false,
    };
    let kernel = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut a = [0u8; TAG_LEN];
    let mut b = [0u8; TAG_LEN];
    kernel.hash_password_into(b"secret", b"somesalt", &mut a).is_ok()
        && kernel.hash_password_into(b"secret", b"somesalt", &mut b).is_ok()
        && a == b
        && a != [0u8; TAG_LEN]
}

fn algorithm_from_ident(ident: &str) -> Result<Algorithm> {
    match ident {
        "argon2id" => Ok(Algorithm::Argon2id),
        "argon2i" => Ok(Algorithm::Argon2i),
        "argon2d" => Ok(Algorithm::Argon2d),
        _ => Err(Error::malformed("unknown argon2 variant")),
    }
}

pub struct Argon2Handler {
    desc: &'static HandlerDescriptor,
}

impl Argon2Handler {
    /// 按记录中的参数重算摘要
    fn derive(&self, secret: &[u8], record: &HashRecord, out_len: usize) -> Result<Vec<u8>> {
        let ident = record
            .str_param("ident")
            .ok_or_else(|| Error::malformed("missing variant"))?;
        let algorithm = algorithm_from_ident(ident)?;
        let version = match record.int_param("v") {
            Some(16) => Version::V0x10,
            Some(19) | None => Version::V0x13,
            Some(_) => return Err(Error::malformed("unsupported argon2 version")),
        };
        let m = record.int_param("m").ok_or_else(|| Error::malformed("missing m"))?;
        let t = record.int_param("t").ok_or_else(|| Error::malformed("missing t"))?;
        let p = record.int_param("p").ok_or_else(|| Error::malformed("missing p"))?;
        let params = Params::new(
            u32::try_from(m).map_err(|_| Error::malformed("m out of range"))?,
            u32::try_from(t).map_err(|_| Error::malformed("t out of range"))?,
            u32::try_from(p).map_err(|_| Error::malformed("p out of range"))?,
            Some(out_len),
        )
        .map_err(|e| Error::Crypto(format!("argon2: invalid parameters: {}", e)))?;
        let mut out = vec![0u8; out_len];
        Argon2::new(algorithm, version, params)
            .hash_password_into(secret, &record.salt, &mut out)
            .map_err(|e| Error::Crypto(format!("argon2: {}", e)))?;
        Ok(out)
    }
}

impl Handler for Argon2Handler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        self.desc.idents.iter().any(|p| hash.starts_with(p))
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let ph = PasswordHash::new(hash).map_err(|_| Error::malformed("invalid PHC string"))?;
        algorithm_from_ident(ph.algorithm.as_str())?;
        let salt = ph.salt.ok_or_else(|| Error::malformed("missing salt field"))?;
        let mut salt_buf = [0u8; 64];
        let salt_bytes = salt
            .decode_b64(&mut salt_buf)
            .map_err(|_| Error::malformed("invalid salt encoding"))?;

        let mut record = HashRecord::config(self.desc.scheme_id, salt_bytes.to_vec());
        record.push_param("ident", ParamValue::Str(ph.algorithm.as_str().to_string()));
        if let Some(v) = ph.version {
            record.push_param("v", ParamValue::Int(u64::from(v)));
        }
        // ParamsString 保序迭代，m/t/p 的原始顺序决定序列化顺序
        for (key, value) in ph.params.iter() {
            let n = value
                .decimal()
                .map_err(|_| Error::Malformed(format!("non-numeric {} parameter", key)))?;
            record.push_param(key.as_str(), ParamValue::Int(u64::from(n)));
        }
        if let Some(output) = ph.hash {
            record.checksum = output.as_bytes().to_vec();
        }
        record.raw = Some(hash.to_string());
        Ok(record)
    }

    fn encode(&self, record: &HashRecord) -> Result<String> {
        let ident = record
            .str_param("ident")
            .ok_or_else(|| Error::malformed("missing variant"))?;
        let mut out = format!("${}", ident);
        if let Some(v) = record.int_param("v") {
            out.push_str(&format!("$v={}", v));
        }
        let numeric: Vec<String> = record
            .params
            .iter()
            .filter(|(k, _)| k.as_str() != "ident" && k.as_str() != "v")
            .map(|(k, v)| match v {
                ParamValue::Int(n) => format!("{}={}", k, n),
                ParamValue::Str(s) => format!("{}={}", k, s),
            })
            .collect();
        if !numeric.is_empty() {
            out.push('$');
            out.push_str(&numeric.join(","));
        }
        out.push('$');
        out.push_str(&STANDARD_NO_PAD.encode(&record.salt));
        if !record.checksum.is_empty() {
            out.push('$');
            out.push_str(&STANDARD_NO_PAD.encode(&record.checksum));
        }
        Ok(out)
    }

    fn genconfig(&self, policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord> {
        let rp = required_rounds_policy(self.desc, policy)?;
        let t = rp.resolve(rounds)?;
        let salt_len = self.desc.salt.map_or(16, |s| s.default_len);
        let mut record = HashRecord::config(self.desc.scheme_id, generate_salt_bytes(salt_len)?);
        record.push_param("ident", ParamValue::Str("argon2id".to_string()));
        record.push_param("v", ParamValue::Int(19));
        record.push_param("m", ParamValue::Int(u64::from(Params::DEFAULT_M_COST)));
        record.push_param("t", ParamValue::Int(u64::from(t)));
        record.push_param("p", ParamValue::Int(u64::from(Params::DEFAULT_P_COST)));
        Ok(record)
    }

    fn hash(
        &self,
        secret: &[u8],
        config: Option<&HashRecord>,
        policy: &SchemePolicy,
    ) -> Result<String> {
        validate_secret(secret, self.desc, policy)?;
        let owned;
        let record = match config {
            Some(r) => {
                if let Some(t) = r.int_param("t").and_then(|n| u32::try_from(n).ok()) {
                    required_rounds_policy(self.desc, policy)?.resolve(Some(t))?;
                }
                r
            }
            None => {
                owned = self.genconfig(policy, None)?;
                &owned
            }
        };
        let out_len = if record.checksum.is_empty() {
            TAG_LEN
        } else {
            record.checksum.len()
        };
        let mut out = record.clone();
        out.checksum = self.derive(secret, record, out_len)?;
        out.raw = None;
        self.encode(&out)
    }

    fn verify(&self, secret: &[u8], hash: &str) -> bool {
        if secret.len() > crate::handler::MAX_SECRET_SIZE {
            return false;
        }
        let Ok(record) = self.parse(hash) else {
            return false;
        };
        if record.checksum.is_empty() {
            return false;
        }
        let Ok(candidate) = self.derive(secret, &record, record.checksum.len()) else {
            return false;
        };
        consteq(&candidate, &record.checksum)
    }

    fn stored_rounds(&self, record: &HashRecord) -> Option<u32> {
        record.int_param("t").and_then(|n| u32::try_from(n).ok())
    }

    fn available(&self) -> bool {
        *AVAILABLE.get_or_init(self_test)
    }

    fn backend_info(&self) -> BackendInfo {
        if self.available() {
            BackendInfo {
                name: "rustcrypto/argon2",
                fallbacks_skipped: 0,
            }
        } else {
            BackendInfo {
                name: "unavailable",
                fallbacks_skipped: 1,
            }
        }
    }
}
