//! sha256-crypt / sha512-crypt 方案
//!
//! 编码：`$5$[rounds=N$]salt$chk` 与 `$6$...`。rounds 字段可省略，
//! 隐含 5000；序列化必须原样保留省略与否，否则破坏字节级往返。
//! 盐是最长 16 个 hash64 字符的字面字符串。

use crate::backend::shacrypt::{ShaCryptKernel, sha256_crypt_checksum, sha512_crypt_checksum};
use crate::backend::{BackendCell, BackendInfo, Candidate};
use crate::codec::hash64::is_hash64;
use crate::codec::{HashRecord, ParamValue, parse_int_field};
use crate::error::{Error, Result};
use crate::handler::{
    CostScale, Handler, HandlerDescriptor, RoundsSpec, SaltSpec, SchemePolicy, consteq,
    generate_salt_hash64, required_rounds_policy, validate_secret,
};

/// rounds 字段省略时的隐含值（crypt(3) 规范）
const IMPLICIT_ROUNDS: u32 = 5000;

/// SHA-256 变体
pub static SHA256_CRYPT: ShaCryptHandler = ShaCryptHandler {
    desc: &HandlerDescriptor {
        scheme_id: "sha256_crypt",
        idents: &["$5$"],
        salt: Some(SaltSpec {
            min_len: 0,
            max_len: 16,
            default_len: 16,
        }),
        rounds: Some(RoundsSpec {
            min: 1000,
            max: 999_999_999,
            default: 535_000,
            scale: CostScale::Linear,
        }),
        checksum_len: 43,
        truncate_size: None,
    },
    cell: &SHA256_CELL,
    candidates: &[Candidate::new(
        "vendored/sha256-crypt",
        sha256_crypt_checksum as ShaCryptKernel,
    )],
    self_test: sha256_self_test,
};

/// SHA-512 变体
pub static SHA512_CRYPT: ShaCryptHandler = ShaCryptHandler {
    desc: &HandlerDescriptor {
        scheme_id: "sha512_crypt",
        idents: &["$6$"],
        salt: Some(SaltSpec {
            min_len: 0,
            max_len: 16,
            default_len: 16,
        }),
        rounds: Some(RoundsSpec {
            min: 1000,
            max: 999_999_999,
            default: 656_000,
            scale: CostScale::Linear,
        }),
        checksum_len: 86,
        truncate_size: None,
    },
    cell: &SHA512_CELL,
    candidates: &[Candidate::new(
        "vendored/sha512-crypt",
        sha512_crypt_checksum as ShaCryptKernel,
    )],
    self_test: sha512_self_test,
};

static SHA256_CELL: BackendCell<ShaCryptKernel> = BackendCell::new();
static SHA512_CELL: BackendCell<ShaCryptKernel> = BackendCell::new();

// 参考规范发布的 "Hello world!" / "saltstring" 向量
fn sha256_self_test(kernel: &ShaCryptKernel) -> bool {
    kernel(b"Hello world!", b"saltstring", 5000)
        == "5B8vYYiY.CVt1RlTTf8KbXBH3hsxY/GNooZaBBGWEc5"
}

fn sha512_self_test(kernel: &ShaCryptKernel) -> bool {
    kernel(b"Hello world!", b"saltstring", 5000)
        == "svn8UoSVapNtMuq1ukKS4tPQd8iKwSMHWjl/O817G3uBnIFNjnQJuesI68u4OTLiBFdcbYEdFCoEOfaS35inz1"
}

/// sha-crypt 适配器，两种摘要宽度共用
pub struct ShaCryptHandler {
    desc: &'static HandlerDescriptor,
    cell: &'static BackendCell<ShaCryptKernel>,
    candidates: &'static [Candidate<ShaCryptKernel>],
    self_test: fn(&ShaCryptKernel) -> bool,
}

impl ShaCryptHandler {
    fn ident(&self) -> &'static str {
        self.desc.idents[0]
    }

    fn kernel(&self) -> Result<ShaCryptKernel> {
        self.cell
            .get_or_select(self.candidates, self.self_test)
            .map(|s| s.kernel)
            .ok_or_else(|| Error::BackendUnavailable(self.desc.scheme_id.to_string()))
    }

    fn validate_salt(&self, salt: &str) -> Result<()> {
        let spec = self.desc.salt.as_ref();
        let max = spec.map_or(16, |s| s.max_len);
        if salt.len() > max {
            return Err(Error::malformed("salt too long"));
        }
        if !salt.is_empty() && !is_hash64(salt) {
            return Err(Error::malformed("salt contains invalid characters"));
        }
        Ok(())
    }
}

impl Handler for ShaCryptHandler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        hash.starts_with(self.ident())
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let rest = hash
            .strip_prefix(self.ident())
            .ok_or_else(|| Error::malformed("unexpected prefix"))?;
        let fields: Vec<&str> = rest.split('$').collect();
        let (rounds, explicit, salt, chk) = match fields.as_slice() {
            [first, rest @ ..] if first.starts_with("rounds=") => {
                let rounds = parse_int_field(&first["rounds=".len()..], "rounds")?;
                match rest {
                    [salt] => (rounds, true, *salt, None),
                    [salt, chk] => (rounds, true, *salt, Some(*chk)),
                    _ => return Err(Error::malformed("wrong number of fields")),
                }
            }
            [salt] => (IMPLICIT_ROUNDS, false, *salt, None),
            [salt, chk] => (IMPLICIT_ROUNDS, false, *salt, Some(*chk)),
            _ => return Err(Error::malformed("wrong number of fields")),
        };
        self.validate_salt(salt)?;
        let checksum = match chk {
            Some(text) => {
                if text.len() != self.desc.checksum_len || !is_hash64(text) {
                    return Err(Error::malformed("invalid checksum field"));
                }
                text.as_bytes().to_vec()
            }
            None => Vec::new(),
        };
        let mut record = HashRecord::config(self.desc.scheme_id, salt.as_bytes().to_vec());
        if explicit {
            record.push_param("rounds", ParamValue::Int(u64::from(rounds)));
        }
        record.checksum = checksum;
        record.raw = Some(hash.to_string());
        Ok(record)
    }

    fn encode(&self, record: &HashRecord) -> Result<String> {
        let salt = String::from_utf8(record.salt.clone())
            .map_err(|_| Error::malformed("salt is not valid text"))?;
        let checksum = String::from_utf8(record.checksum.clone())
            .map_err(|_| Error::malformed("checksum is not valid text"))?;
        let mut out = String::from(self.ident());
        if let Some(rounds) = record.rounds() {
            out.push_str("rounds=");
            out.push_str(&rounds.to_string());
            out.push('$');
        }
        out.push_str(&salt);
        if !checksum.is_empty() {
            out.push('$');
            out.push_str(&checksum);
        }
        Ok(out)
    }

    fn genconfig(&self, policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord> {
        let rp = required_rounds_policy(self.desc, policy)?;
        let rounds = rp.resolve(rounds)?;
        let salt_len = self.desc.salt.map_or(16, |s| s.default_len);
        let salt = generate_salt_hash64(salt_len)?;
        let mut record = HashRecord::config(self.desc.scheme_id, salt.into_bytes());
        // genconfig 永远显式写出 rounds，隐含 5000 只用于解析旧哈希
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
                if let Some(explicit) = r.rounds() {
                    required_rounds_policy(self.desc, policy)?.resolve(Some(explicit))?;
                }
                r
            }
            None => {
                owned = self.genconfig(policy, None)?;
                &owned
            }
        };
        let rounds = self.stored_rounds(record).unwrap_or(IMPLICIT_ROUNDS);
        let kernel = self.kernel()?;
        let checksum = kernel(secret, &record.salt, rounds);
        let mut out = record.clone();
        out.checksum = checksum.into_bytes();
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
        // 验证不施加 rounds 范围限制：旧哈希必须永远可验证
        let rounds = record.rounds().unwrap_or(IMPLICIT_ROUNDS);
        let Ok(kernel) = self.kernel() else {
            return false;
        };
        let candidate = kernel(secret, &record.salt, rounds);
        consteq(candidate.as_bytes(), &record.checksum)
    }

    fn stored_rounds(&self, record: &HashRecord) -> Option<u32> {
        Some(record.rounds().unwrap_or(IMPLICIT_ROUNDS))
    }

    fn available(&self) -> bool {
        self.cell.get_or_select(self.candidates, self.self_test).is_some()
    }

    fn backend_info(&self) -> BackendInfo {
        match self.cell.get_or_select(self.candidates, self.self_test) {
            Some(s) => BackendInfo {
                name: s.name,
                fallbacks_skipped: s.fallbacks_skipped,
            },
            None => BackendInfo {
                name: "unavailable",
                fallbacks_skipped: self.candidates.len(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_policy() -> SchemePolicy {
        SchemePolicy {
            default_rounds: Some(1000),
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_vector_verifies() {
        let hash = "$5$saltstring$5B8vYYiY.CVt1RlTTf8KbXBH3hsxY/GNooZaBBGWEc5";
        assert!(SHA256_CRYPT.verify(b"Hello world!", hash));
        assert!(!SHA256_CRYPT.verify(b"Hello world?", hash));
    }

    #[test]
    fn test_sha512_reference_vector_verifies() {
        let hash = "$6$saltstring$svn8UoSVapNtMuq1ukKS4tPQd8iKwSMHWjl/O817G3uBnIFNjnQJuesI68u4OTLiBFdcbYEdFCoEOfaS35inz1";
        assert!(SHA512_CRYPT.verify(b"Hello world!", hash));
    }

    #[test]
    fn test_implicit_rounds_round_trip() {
        let hash = "$5$saltstring$5B8vYYiY.CVt1RlTTf8KbXBH3hsxY/GNooZaBBGWEc5";
        let record = SHA256_CRYPT.parse(hash).unwrap();
        assert_eq!(record.rounds(), None);
        assert_eq!(SHA256_CRYPT.stored_rounds(&record), Some(5000));
        assert_eq!(SHA256_CRYPT.encode(&record).unwrap(), hash);
    }

    #[test]
    fn test_explicit_rounds_round_trip() {
        let hash = SHA256_CRYPT.hash(b"secret", None, &quick_policy()).unwrap();
        assert!(hash.starts_with("$5$rounds=1000$"));
        let record = SHA256_CRYPT.parse(&hash).unwrap();
        assert_eq!(SHA256_CRYPT.encode(&record).unwrap(), hash);
        assert!(SHA256_CRYPT.verify(b"secret", &hash));
    }

    #[test]
    fn test_explicit_rounds_5000_is_preserved() {
        // rounds=5000 显式写出时不能被折叠成隐含形式
        let hash = "$5$rounds=5000$saltstring$5B8vYYiY.CVt1RlTTf8KbXBH3hsxY/GNooZaBBGWEc5";
        let record = SHA256_CRYPT.parse(hash).unwrap();
        assert_eq!(record.rounds(), Some(5000));
        assert_eq!(SHA256_CRYPT.encode(&record).unwrap(), hash);
        assert!(SHA256_CRYPT.verify(b"Hello world!", hash));
    }

    #[test]
    fn test_parse_rejects_bad_salt_and_checksum() {
        assert!(SHA256_CRYPT.parse("$5$salt with spaces$chk").is_err());
        assert!(SHA256_CRYPT.parse("$5$thissaltiswaytoolongtobelegal$chk").is_err());
        assert!(SHA256_CRYPT.parse("$5$salt$shortchk").is_err());
        assert!(SHA256_CRYPT.parse("$5$rounds=03000$salt$chk").is_err());
    }

    #[test]
    fn test_needs_update_below_policy_minimum() {
        let hash = SHA256_CRYPT.hash(b"x", None, &quick_policy()).unwrap();
        let strict = SchemePolicy {
            min_rounds: Some(100_000),
            ..Default::default()
        };
        assert!(SHA256_CRYPT.needs_update(&hash, &strict));
        assert!(!SHA256_CRYPT.needs_update(&hash, &SchemePolicy::default()));
    }
}
