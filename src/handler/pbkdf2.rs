//! pbkdf2 方案族
//!
//! passlib 风格编码：`$pbkdf2-sha256$rounds$salt$chk`，盐与校验和使用
//! adapted base64。SHA-256 与 SHA-512 两个变体共用同一适配器。

use crate::backend::pbkdf2::{
    Pbkdf2Kernel, fallback_sha256, fallback_sha512, rustcrypto_sha256, rustcrypto_sha512,
};
use crate::backend::{BackendCell, BackendInfo, Candidate};
use crate::codec::{HashRecord, ParamValue, ab64_decode, ab64_encode, parse_mc3, render_mc3};
use crate::error::{Error, Result};
use crate::handler::{
    CostScale, Handler, HandlerDescriptor, RoundsSpec, SaltSpec, SchemePolicy, consteq,
    generate_salt_bytes, required_rounds_policy, validate_secret,
};

/// HMAC-SHA256 变体
pub static PBKDF2_SHA256: Pbkdf2Handler = Pbkdf2Handler {
    desc: &HandlerDescriptor {
        scheme_id: "pbkdf2_sha256",
        idents: &["$pbkdf2-sha256$"],
        salt: Some(SaltSpec {
            min_len: 8,
            max_len: 1024,
            default_len: 16,
        }),
        rounds: Some(RoundsSpec {
            min: 1,
            max: 100_000_000,
            default: 29_000,
            scale: CostScale::Linear,
        }),
        checksum_len: 43,
        truncate_size: None,
    },
    digest_len: 32,
    cell: &SHA256_CELL,
    candidates: &[
        Candidate::new("rustcrypto/pbkdf2-sha256", rustcrypto_sha256 as Pbkdf2Kernel),
        Candidate::new("vendored/hmac-sha256-loop", fallback_sha256 as Pbkdf2Kernel),
    ],
    self_test: sha256_self_test,
};

/// HMAC-SHA512 变体
pub static PBKDF2_SHA512: Pbkdf2Handler = Pbkdf2Handler {
    desc: &HandlerDescriptor {
        scheme_id: "pbkdf2_sha512",
        idents: &["$pbkdf2-sha512$"],
        salt: Some(SaltSpec {
            min_len: 8,
            max_len: 1024,
            default_len: 16,
        }),
        rounds: Some(RoundsSpec {
            min: 1,
            max: 100_000_000,
            default: 25_000,
            scale: CostScale::Linear,
        }),
        checksum_len: 86,
        truncate_size: None,
    },
    digest_len: 64,
    cell: &SHA512_CELL,
    candidates: &[
        Candidate::new("rustcrypto/pbkdf2-sha512", rustcrypto_sha512 as Pbkdf2Kernel),
        Candidate::new("vendored/hmac-sha512-loop", fallback_sha512 as Pbkdf2Kernel),
    ],
    self_test: sha512_self_test,
};

static SHA256_CELL: BackendCell<Pbkdf2Kernel> = BackendCell::new();
static SHA512_CELL: BackendCell<Pbkdf2Kernel> = BackendCell::new();

// PBKDF2-HMAC-SHA256("password", "salt", c=1) 的前 16 字节
const SHA256_KAT: [u8; 16] = [
    0x12, 0x0f, 0xb6, 0xcf, 0xfc, 0xf8, 0xb3, 0x2c, 0x43, 0xe7, 0x22, 0x52, 0x56, 0xc4, 0xf8,
    0x37,
];

// PBKDF2-HMAC-SHA512("password", "salt", c=1) 的前 16 字节
const SHA512_KAT: [u8; 16] = [
    0x86, 0x7f, 0x70, 0xcf, 0x1a, 0xde, 0x02, 0xcf, 0xf3, 0x75, 0x25, 0x99, 0xa3, 0xa5, 0x3d,
    0xc4,
];

fn sha256_self_test(kernel: &Pbkdf2Kernel) -> bool {
    let mut out = [0u8; 16];
    kernel(b"password", b"salt", 1, &mut out);
    out == SHA256_KAT
}

fn sha512_self_test(kernel: &Pbkdf2Kernel) -> bool {
    let mut out = [0u8; 16];
    kernel(b"password", b"salt", 1, &mut out);
    out == SHA512_KAT
}

/// pbkdf2 适配器，两种摘要宽度共用
pub struct Pbkdf2Handler {
    desc: &'static HandlerDescriptor,
    digest_len: usize,
    cell: &'static BackendCell<Pbkdf2Kernel>,
    candidates: &'static [Candidate<Pbkdf2Kernel>],
    self_test: fn(&Pbkdf2Kernel) -> bool,
}

impl Pbkdf2Handler {
    fn ident(&self) -> &'static str {
        self.desc.idents[0]
    }

    fn kernel(&self) -> Result<Pbkdf2Kernel> {
        self.cell
            .get_or_select(self.candidates, self.self_test)
            .map(|s| s.kernel)
            .ok_or_else(|| Error::BackendUnavailable(self.desc.scheme_id.to_string()))
    }

    fn derive(&self, secret: &[u8], salt: &[u8], rounds: u32) -> Result<Vec<u8>> {
        let kernel = self.kernel()?;
        let mut out = vec![0u8; self.digest_len];
        kernel(secret, salt, rounds, &mut out);
        Ok(out)
    }
}

impl Handler for Pbkdf2Handler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        hash.starts_with(self.ident())
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let (rounds, _explicit, salt, chk) = parse_mc3(hash, self.ident(), None)?;
        if salt.is_empty() {
            return Err(Error::malformed("empty salt field"));
        }
        let salt = ab64_decode(salt)?;
        let checksum = match chk {
            Some(text) => {
                if text.len() != self.desc.checksum_len {
                    return Err(Error::malformed("wrong checksum length"));
                }
                ab64_decode(text)?
            }
            None => Vec::new(),
        };
        let mut record = HashRecord::config(self.desc.scheme_id, salt);
        record.push_param("rounds", ParamValue::Int(u64::from(rounds)));
        record.checksum = checksum;
        record.raw = Some(hash.to_string());
        Ok(record)
    }

    fn encode(&self, record: &HashRecord) -> Result<String> {
        let rounds = record
            .rounds()
            .ok_or_else(|| Error::malformed("missing rounds parameter"))?;
        Ok(render_mc3(
            self.ident(),
            Some(rounds),
            &ab64_encode(&record.salt),
            &ab64_encode(&record.checksum),
        ))
    }

    fn genconfig(&self, policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord> {
        let rp = required_rounds_policy(self.desc, policy)?;
        let rounds = rp.resolve(rounds)?;
        let salt_len = self.desc.salt.map_or(16, |s| s.default_len);
        let mut record = HashRecord::config(self.desc.scheme_id, generate_salt_bytes(salt_len)?);
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
                let rp = required_rounds_policy(self.desc, policy)?;
                rp.resolve(r.rounds())?;
                r
            }
            None => {
                owned = self.genconfig(policy, None)?;
                &owned
            }
        };
        let rounds = record
            .rounds()
            .ok_or_else(|| Error::malformed("missing rounds parameter"))?;
        let mut out = record.clone();
        out.checksum = self.derive(secret, &record.salt, rounds)?;
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
        let Some(rounds) = record.rounds() else {
            return false;
        };
        if record.checksum.is_empty() {
            return false;
        }
        let Ok(candidate) = self.derive(secret, &record.salt, rounds) else {
            return false;
        };
        consteq(&candidate, &record.checksum)
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
    fn test_hash_verify_round_trip() {
        let hash = PBKDF2_SHA256.hash(b"swordfish", None, &quick_policy()).unwrap();
        assert!(hash.starts_with("$pbkdf2-sha256$1000$"));
        assert!(PBKDF2_SHA256.verify(b"swordfish", &hash));
        assert!(!PBKDF2_SHA256.verify(b"tunafish", &hash));
    }

    #[test]
    fn test_parse_encode_round_trip() {
        let hash = PBKDF2_SHA512.hash(b"secret", None, &quick_policy()).unwrap();
        let record = PBKDF2_SHA512.parse(&hash).unwrap();
        assert_eq!(PBKDF2_SHA512.encode(&record).unwrap(), hash);
    }

    #[test]
    fn test_genconfig_record_round_trips_through_parse() {
        let config = PBKDF2_SHA256.genconfig(&quick_policy(), None).unwrap();
        let text = PBKDF2_SHA256.encode(&config).unwrap();
        let reparsed = PBKDF2_SHA256.parse(&text).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_verify_rejects_malformed() {
        assert!(!PBKDF2_SHA256.verify(b"x", "$pbkdf2-sha256$abc"));
        assert!(!PBKDF2_SHA256.verify(b"x", "$pbkdf2-sha256$0999$salt$chk"));
        assert!(!PBKDF2_SHA256.verify(b"x", "$$$garbage"));
    }

    #[test]
    fn test_explicit_rounds_respected_and_bounded() {
        let hash = PBKDF2_SHA256
            .hash(
                b"x",
                Some(&PBKDF2_SHA256.genconfig(&SchemePolicy::default(), Some(777)).unwrap()),
                &SchemePolicy::default(),
            )
            .unwrap();
        assert!(hash.starts_with("$pbkdf2-sha256$777$"));

        let err = PBKDF2_SHA256
            .genconfig(&SchemePolicy::default(), Some(999_999_999))
            .unwrap_err();
        assert!(matches!(err, Error::RoundsOutOfRange { .. }));
    }

    #[test]
    fn test_backend_selected_without_degradation() {
        let info = PBKDF2_SHA256.backend_info();
        assert_eq!(info.name, "rustcrypto/pbkdf2-sha256");
        assert_eq!(info.fallbacks_skipped, 0);
    }

    #[test]
    fn test_identify_disjoint_from_sha512() {
        let hash = PBKDF2_SHA256.hash(b"x", None, &quick_policy()).unwrap();
        assert!(PBKDF2_SHA256.identify(&hash));
        assert!(!PBKDF2_SHA512.identify(&hash));
    }
}
