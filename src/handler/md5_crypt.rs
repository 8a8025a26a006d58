//! md5-crypt 方案
//!
//! 编码：`$1$salt$chk`，固定 1000 轮，无 rounds 参数。
//! 遗留方案，只为验证旧库存保留；新哈希不应选它。

use crate::backend::md5crypt::{Md5CryptKernel, md5_crypt_checksum};
use crate::backend::{BackendCell, BackendInfo, Candidate};
use crate::codec::hash64::is_hash64;
use crate::codec::{HashRecord, parse_mc2, render_mc2};
use crate::error::{Error, Result};
use crate::handler::{
    Handler, HandlerDescriptor, SaltSpec, SchemePolicy, consteq, generate_salt_hash64,
    validate_secret,
};

pub static MD5_CRYPT: Md5CryptHandler = Md5CryptHandler {
    desc: &HandlerDescriptor {
        scheme_id: "md5_crypt",
        idents: &["$1$"],
        salt: Some(SaltSpec {
            min_len: 0,
            max_len: 8,
            default_len: 8,
        }),
        rounds: None,
        checksum_len: 22,
        truncate_size: None,
    },
};

static CELL: BackendCell<Md5CryptKernel> = BackendCell::new();

static CANDIDATES: &[Candidate<Md5CryptKernel>] = &[Candidate::new(
    "vendored/md5-crypt",
    md5_crypt_checksum as Md5CryptKernel,
)];

// "$1$deadbeef$0Huu6KHrKLVWfqa4WljDE0" 的公开已知答案
fn self_test(kernel: &Md5CryptKernel) -> bool {
    kernel(b"0.s0.l33t", b"deadbeef") == "0Huu6KHrKLVWfqa4WljDE0"
}

pub struct Md5CryptHandler {
    desc: &'static HandlerDescriptor,
}

impl Md5CryptHandler {
    fn kernel(&self) -> Result<Md5CryptKernel> {
        CELL.get_or_select(CANDIDATES, self_test)
            .map(|s| s.kernel)
            .ok_or_else(|| Error::BackendUnavailable(self.desc.scheme_id.to_string()))
    }
}

impl Handler for Md5CryptHandler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        hash.starts_with("$1$")
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let (salt, chk) = parse_mc2(hash, "$1$")?;
        if salt.len() > 8 {
            return Err(Error::malformed("salt too long"));
        }
        if !salt.is_empty() && !is_hash64(salt) {
            return Err(Error::malformed("salt contains invalid characters"));
        }
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
        record.checksum = checksum;
        record.raw = Some(hash.to_string());
        Ok(record)
    }

    fn encode(&self, record: &HashRecord) -> Result<String> {
        let salt = String::from_utf8(record.salt.clone())
            .map_err(|_| Error::malformed("salt is not valid text"))?;
        let chk = String::from_utf8(record.checksum.clone())
            .map_err(|_| Error::malformed("checksum is not valid text"))?;
        Ok(render_mc2("$1$", &salt, &chk))
    }

    fn genconfig(&self, _policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord> {
        if rounds.is_some() {
            return Err(Error::invalid_policy("md5_crypt accepts no rounds parameter"));
        }
        let salt = generate_salt_hash64(8)?;
        Ok(HashRecord::config(self.desc.scheme_id, salt.into_bytes()))
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
            Some(r) => r,
            None => {
                owned = self.genconfig(policy, None)?;
                &owned
            }
        };
        let kernel = self.kernel()?;
        let checksum = kernel(secret, &record.salt);
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
        let Ok(kernel) = self.kernel() else {
            return false;
        };
        let candidate = kernel(secret, &record.salt);
        consteq(candidate.as_bytes(), &record.checksum)
    }

    fn available(&self) -> bool {
        CELL.get_or_select(CANDIDATES, self_test).is_some()
    }

    fn backend_info(&self) -> BackendInfo {
        match CELL.get_or_select(CANDIDATES, self_test) {
            Some(s) => BackendInfo {
                name: s.name,
                fallbacks_skipped: s.fallbacks_skipped,
            },
            None => BackendInfo {
                name: "unavailable",
                fallbacks_skipped: CANDIDATES.len(),
            },
        }
    }
}
