//! scrypt 方案
//!
//! PHC 格式：`$scrypt$ln=16,r=8,p=1$salt$hash`。cost 参数映射：
//! rounds = ln（以 2 为底的指数），r 与 p 由 genconfig 取固定默认，
//! 验证旧哈希时按记录参数重算。

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

pub static SCRYPT_HANDLER: ScryptHandler = ScryptHandler {
    desc: &HandlerDescriptor {
        scheme_id: "scrypt",
        idents: &["$scrypt$"],
        salt: Some(SaltSpec {
            min_len: 8,
            max_len: 64,
            default_len: 16,
        }),
        rounds: Some(RoundsSpec {
            min: 1,
            max: 31,
            default: 16,
            scale: CostScale::Log2,
        }),
        checksum_len: 0,
        truncate_size: None,
    },
};

/// 输出摘要长度（字节）
const TAG_LEN: usize = 32;

static AVAILABLE: std::sync::OnceLock<bool> = std::sync::OnceLock::new();

// RFC 7914 测试向量：N=1024 (ln=10), r=8, p=16
fn self_test() -> bool {
    let Ok(params) = scrypt::Params::new(10, 8, 16, 16) else {
        return false;
    };
    let mut out = [0u8; 16];
    if scrypt::scrypt(b"password", b"NaCl", &params, &mut out).is_err() {
        return false;
    }
    out == [
        0xfd, 0xba, 0xbe, 0x1c, 0x9d, 0x34, 0x72, 0x00, 0x78, 0x56, 0xe7, 0x19, 0x0d, 0x01,
        0xe9, 0xfe,
    ]
}

pub struct ScryptHandler {
    desc: &'static HandlerDescriptor,
}

impl ScryptHandler {
    fn derive(&self, secret: &[u8], record: &HashRecord, out_len: usize) -> Result<Vec<u8>> {
        let ln = record.int_param("ln").ok_or_else(|| Error::malformed("missing ln"))?;
        let r = record.int_param("r").ok_or_else(|| Error::malformed("missing r"))?;
        let p = record.int_param("p").ok_or_else(|| Error::malformed("missing p"))?;
        let params = scrypt::Params::new(
            u8::try_from(ln).map_err(|_| Error::malformed("ln out of range"))?,
            u32::try_from(r).map_err(|_| Error::malformed("r out of range"))?,
            u32::try_from(p).map_err(|_| Error::malformed("p out of range"))?,
            out_len,
        )
        .map_err(|e| Error::Crypto(format!("scrypt: invalid parameters: {}", e)))?;
        let mut out = vec![0u8; out_len];
        scrypt::scrypt(secret, &record.salt, &params, &mut out)
            .map_err(|e| Error::Crypto(format!("scrypt: {}", e)))?;
        Ok(out)
    }
}

impl Handler for ScryptHandler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        hash.starts_with("$scrypt$")
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let ph = PasswordHash::new(hash).map_err(|_| Error::malformed("invalid PHC string"))?;
        if ph.algorithm.as_str() != "scrypt" {
            return Err(Error::malformed("not a scrypt hash"));
        }
        let salt = ph.salt.ok_or_else(|| Error::malformed("missing salt field"))?;
        let mut salt_buf = [0u8; 64];
        let salt_bytes = salt
            .decode_b64(&mut salt_buf)
            .map_err(|_| Error::malformed("invalid salt encoding"))?;

        let mut record = HashRecord::config(self.desc.scheme_id, salt_bytes.to_vec());
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
        let params: Vec<String> = record
            .params
            .iter()
            .map(|(k, v)| match v {
                ParamValue::Int(n) => format!("{}={}", k, n),
                ParamValue::Str(s) => format!("{}={}", k, s),
            })
            .collect();
        let mut out = String::from("$scrypt$");
        out.push_str(&params.join(","));
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
        let ln = rp.resolve(rounds)?;
        let salt_len = self.desc.salt.map_or(16, |s| s.default_len);
        let mut record = HashRecord::config(self.desc.scheme_id, generate_salt_bytes(salt_len)?);
        record.push_param("ln", ParamValue::Int(u64::from(ln)));
        record.push_param("r", ParamValue::Int(8));
        record.push_param("p", ParamValue::Int(1));
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
                if let Some(ln) = r.int_param("ln").and_then(|n| u32::try_from(n).ok()) {
                    required_rounds_policy(self.desc, policy)?.resolve(Some(ln))?;
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
        record.int_param("ln").and_then(|n| u32::try_from(n).ok())
    }

    fn available(&self) -> bool {
        *AVAILABLE.get_or_init(self_test)
    }

    fn backend_info(&self) -> BackendInfo {
        if self.available() {
            BackendInfo {
                name: "rustcrypto/scrypt",
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

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_policy() -> SchemePolicy {
        SchemePolicy {
            default_rounds: Some(4),
            ..Default::default()
        }
    }

    #[test]
    fn test_hash_verify_round_trip() {
        let hash = SCRYPT_HANDLER.hash(b"secret", None, &quick_policy()).unwrap();
        assert!(hash.starts_with("$scrypt$ln=4,r=8,p=1$"));
        assert!(SCRYPT_HANDLER.verify(b"secret", &hash));
        assert!(!SCRYPT_HANDLER.verify(b"Secret", &hash));
    }

    #[test]
    fn test_parse_encode_round_trip() {
        let hash = SCRYPT_HANDLER.hash(b"x", None, &quick_policy()).unwrap();
        let record = SCRYPT_HANDLER.parse(&hash).unwrap();
        assert_eq!(SCRYPT_HANDLER.encode(&record).unwrap(), hash);
        assert_eq!(SCRYPT_HANDLER.stored_rounds(&record), Some(4));
    }

    #[test]
    fn test_ln_out_of_range() {
        let err = SCRYPT_HANDLER
            .genconfig(&SchemePolicy::default(), Some(40))
            .unwrap_err();
        assert!(matches!(err, Error::RoundsOutOfRange { .. }));
    }

    #[test]
    fn test_parse_rejects_foreign_phc() {
        assert!(SCRYPT_HANDLER.parse("$argon2id$v=19$m=64,t=2,p=1$AAAA$BBBB").is_err());
        assert!(SCRYPT_HANDLER.parse("$scrypt$garbage").is_err());
    }
}
