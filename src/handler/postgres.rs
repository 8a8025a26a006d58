//! Postgres pg_shadow 口令方案
//!
//! 存储格式：`md5` 前缀加 32 位小写十六进制，MD5(secret || user)。
//! 盐就是数据库账户名，由调用方在每次 hash/verify 时提供。

use md5::{Digest, Md5};

use crate::backend::{BackendCell, BackendInfo, Candidate};
use crate::codec::{HashRecord, hex_decode, hex_encode, is_lower_hex};
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerDescriptor, SchemePolicy, consteq, validate_secret};

pub static POSTGRES_MD5: PostgresMd5Handler = PostgresMd5Handler {
    desc: &HandlerDescriptor {
        scheme_id: "postgres_md5",
        idents: &[],
        salt: None,
        rounds: None,
        checksum_len: 35,
        truncate_size: None,
    },
};

/// postgres_md5 内核签名：(secret, user) -> 16 字节摘要
pub type PostgresKernel = fn(&[u8], &[u8]) -> [u8; 16];

fn md5_user_kernel(secret: &[u8], user: &[u8]) -> [u8; 16] {
    let mut h = Md5::new();
    h.update(secret);
    h.update(user);
    h.finalize().into()
}

static CELL: BackendCell<PostgresKernel> = BackendCell::new();

static CANDIDATES: &[Candidate<PostgresKernel>] = &[Candidate::new(
    "rustcrypto/md5",
    md5_user_kernel as PostgresKernel,
)];

// MD5("mypass" || "postgres") 的公开已知答案
fn self_test(kernel: &PostgresKernel) -> bool {
    hex_encode(&kernel(b"mypass", b"postgres")) == "5fba2ea04fd36069d2574ea71c8efe9d"
}

pub struct PostgresMd5Handler {
    desc: &'static HandlerDescriptor,
}

impl PostgresMd5Handler {
    fn kernel(&self) -> Result<PostgresKernel> {
        CELL.get_or_select(CANDIDATES, self_test)
            .map(|s| s.kernel)
            .ok_or_else(|| Error::BackendUnavailable(self.desc.scheme_id.to_string()))
    }
}

impl Handler for PostgresMd5Handler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        hash.strip_prefix("md5")
            .is_some_and(|rest| is_lower_hex(rest, 32))
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let digest = hash
            .strip_prefix("md5")
            .ok_or_else(|| Error::malformed("missing 'md5' prefix"))?;
        if !is_lower_hex(digest, 32) {
            return Err(Error::malformed("checksum is not 32 lowercase hex digits"));
        }
        let mut record = HashRecord::config(self.desc.scheme_id, Vec::new());
        record.checksum = hex_decode(digest)?;
        record.raw = Some(hash.to_string());
        Ok(record)
    }

    fn encode(&self, record: &HashRecord) -> Result<String> {
        if record.checksum.len() != 16 {
            return Err(Error::malformed("checksum must be 16 bytes"));
        }
        Ok(format!("md5{}", hex_encode(&record.checksum)))
    }

    fn genconfig(&self, _policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord> {
        if rounds.is_some() {
            return Err(Error::invalid_policy("postgres_md5 accepts no rounds parameter"));
        }
        Ok(HashRecord::config(self.desc.scheme_id, Vec::new()))
    }

    fn hash(
        &self,
        _secret: &[u8],
        _config: Option<&HashRecord>,
        _policy: &SchemePolicy,
    ) -> Result<String> {
        Err(Error::UserRequired(self.desc.scheme_id.to_string()))
    }

    fn verify(&self, _secret: &[u8], _hash: &str) -> bool {
        false
    }

    fn user_keyed(&self) -> bool {
        true
    }

    fn hash_with_user(
        &self,
        secret: &[u8],
        user: &str,
        _config: Option<&HashRecord>,
        policy: &SchemePolicy,
    ) -> Result<String> {
        validate_secret(secret, self.desc, policy)?;
        let kernel = self.kernel()?;
        let digest = kernel(secret, user.as_bytes());
        Ok(format!("md5{}", hex_encode(&digest)))
    }

    fn verify_with_user(&self, secret: &[u8], user: &str, hash: &str) -> bool {
        if secret.len() > crate::handler::MAX_SECRET_SIZE {
            return false;
        }
        let Ok(record) = self.parse(hash) else {
            return false;
        };
        let Ok(kernel) = self.kernel() else {
            return false;
        };
        let digest = kernel(secret, user.as_bytes());
        consteq(&digest, &record.checksum)
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
