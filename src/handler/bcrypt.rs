//! bcrypt 方案
//!
//! 编码：`$2b$12${22 字符盐}{31 字符校验和}`，盐与校验和共用一个
//! 53 字符字段，字母表为 bcrypt 专用 base64。cost 是以 2 为底的指数，
//! 序列化固定两位数字。明文只有前 72 字节有效。

use base64::Engine as _;
use base64::alphabet::BCRYPT;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;

use crate::backend::BackendInfo;
use crate::codec::{HashRecord, ParamValue};
use crate::error::{Error, Result};
use crate::handler::{
    CostScale, Handler, HandlerDescriptor, RoundsSpec, SaltSpec, SchemePolicy,
    generate_salt_bytes, required_rounds_policy, validate_secret,
};

pub static BCRYPT_HANDLER: BcryptHandler = BcryptHandler {
    desc: &HandlerDescriptor {
        scheme_id: "bcrypt",
        idents: &["$2b$", "$2a$", "$2y$"],
        salt: Some(SaltSpec {
            min_len: 22,
            max_len: 22,
            default_len: 22,
        }),
        rounds: Some(RoundsSpec {
            min: 4,
            max: 31,
            default: 12,
            scale: CostScale::Log2,
        }),
        checksum_len: 31,
        truncate_size: Some(72),
    },
};

/// bcrypt 专用 base64 引擎；历史哈希的盐可能带非零尾随位，解码放行
const BCRYPT_B64: GeneralPurpose = GeneralPurpose::new(
    &BCRYPT,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

static AVAILABLE: std::sync::OnceLock<bool> = std::sync::OnceLock::new();

// 公开测试向量（OpenWall 套件）
fn self_test() -> bool {
    bcrypt::verify(
        "U*U",
        "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW",
    )
    .unwrap_or(false)
}

fn is_bcrypt_b64(s: &str) -> bool {
    s.bytes()
        .all(|b| b == b'.' || b == b'/' || b.is_ascii_alphanumeric())
}

fn version_for(ident: &str) -> Result<bcrypt::Version> {
    match ident {
        "2b" => Ok(bcrypt::Version::TwoB),
        "2a" => Ok(bcrypt::Version::TwoA),
        "2y" => Ok(bcrypt::Version::TwoY),
        _ => Err(Error::malformed("unknown bcrypt variant")),
    }
}

pub struct BcryptHandler {
    desc: &'static HandlerDescriptor,
}

impl Handler for BcryptHandler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        self.desc.idents.iter().any(|p| hash.starts_with(p))
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let fields: Vec<&str> = hash.split('$').collect();
        let (ident, cost, tail) = match fields.as_slice() {
            ["", ident, cost, tail] => (*ident, *cost, *tail),
            ["", ident, cost] => (*ident, *cost, ""),
            _ => return Err(Error::malformed("wrong number of fields")),
        };
        version_for(ident)?;
        // cost 固定两位数字，"5" 与 "05" 只有后者合法
        if cost.len() != 2 || !cost.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::malformed("cost must be exactly two digits"));
        }
        let rounds = cost
            .parse::<u32>()
            .map_err(|_| Error::malformed("invalid cost field"))?;
        let (salt, chk) = match tail.len() {
            0 => return Err(Error::malformed("missing salt field")),
            22 => (tail, ""),
            53 => tail.split_at(22),
            _ => return Err(Error::malformed("wrong salt/checksum length")),
        };
        if !is_bcrypt_b64(salt) || !is_bcrypt_b64(chk) {
            return Err(Error::malformed("field outside bcrypt alphabet"));
        }
        let mut record = HashRecord::config(self.desc.scheme_id, salt.as_bytes().to_vec());
        record.push_param("ident", ParamValue::Str(ident.to_string()));
        record.push_param("rounds", ParamValue::Int(u64::from(rounds)));
        record.checksum = chk.as_bytes().to_vec();
        record.raw = Some(hash.to_string());
        Ok(record)
    }

    fn encode(&self, record: &HashRecord) -> Result<String> {
        let ident = record.str_param("ident").unwrap_or("2b");
        let rounds = record
            .rounds()
            .ok_or_else(|| Error::malformed("missing rounds parameter"))?;
        let salt = String::from_utf8(record.salt.clone())
            .map_err(|_| Error::malformed("salt is not valid text"))?;
        let chk = String::from_utf8(record.checksum.clone())
            .map_err(|_| Error::malformed("checksum is not valid text"))?;
        Ok(format!("${}${:02}${}{}", ident, rounds, salt, chk))
    }

    fn genconfig(&self, policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord> {
        let rp = required_rounds_policy(self.desc, policy)?;
        let rounds = rp.resolve(rounds)?;
        let salt = BCRYPT_B64.encode(generate_salt_bytes(16)?);
        let mut record = HashRecord::config(self.desc.scheme_id, salt.into_bytes());
        record.push_param("ident", ParamValue::Str("2b".to_string()));
        record.push_param("rounds", ParamValue::Int(u64::from(rounds)));
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
                required_rounds_policy(self.desc, policy)?.resolve(r.rounds())?;
                r
            }
            None => {
                owned = self.genconfig(policy, None)?;
                &owned
            }
        };
        let cost = record
            .rounds()
            .ok_or_else(|| Error::malformed("missing rounds parameter"))?;
        let ident = record.str_param("ident").unwrap_or("2b");
        let version = version_for(ident)?;
        let salt_text = std::str::from_utf8(&record.salt)
            .map_err(|_| Error::malformed("salt is not valid text"))?;
        let decoded = BCRYPT_B64
            .decode(salt_text)
            .map_err(|_| Error::malformed("invalid salt encoding"))?;
        let salt: [u8; 16] = decoded
            .try_into()
            .map_err(|_| Error::malformed("salt must decode to 16 bytes"))?;
        let parts = bcrypt::hash_with_salt(secret, cost, salt)
            .map_err(|e| Error::Crypto(format!("bcrypt: {}", e)))?;
        Ok(parts.format_for_version(version))
    }

    fn verify(&self, secret: &[u8], hash: &str) -> bool {
        if secret.len() > crate::handler::MAX_SECRET_SIZE {
            return false;
        }
        if self.parse(hash).is_err() {
            return false;
        }
        bcrypt::verify(secret, hash).unwrap_or(false)
    }

    fn available(&self) -> bool {
        *AVAILABLE.get_or_init(self_test)
    }

    fn backend_info(&self) -> BackendInfo {
        if self.available() {
            BackendInfo {
                name: "bcrypt-crate",
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
