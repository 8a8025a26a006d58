//! Windows Domain Cached Credentials 方案
//!
//! msdcc（mscash v1）：MD4(MD4(UTF-16LE(secret)) || UTF-16LE(lower(user)))；
//! msdcc2（mscash v2）：对 v1 摘要再做 10240 轮 PBKDF2-HMAC-SHA1，盐同样是
//! 小写用户名的 UTF-16LE。两者都存成裸 32 位小写十六进制，与 hex_md5 的
//! 文本表面重合，归属只能由上下文的启用顺序决定。

use md4::{Digest, Md4};
use sha1::Sha1;

use crate::backend::{BackendCell, BackendInfo, Candidate};
use crate::codec::{HashRecord, hex_decode, hex_encode, is_lower_hex};
use crate::error::{Error, Result};
use crate::handler::nthash::utf16le;
use crate::handler::{Handler, HandlerDescriptor, SchemePolicy, consteq, validate_secret};

/// dcc 内核签名：(secret, user) -> 16 字节摘要
pub type DccKernel = fn(&[u8], &str) -> [u8; 16];

pub static MSDCC: DccHandler = DccHandler {
    desc: &HandlerDescriptor {
        scheme_id: "msdcc",
        idents: &[],
        salt: None,
        rounds: None,
        checksum_len: 32,
        truncate_size: None,
    },
    cell: &MSDCC_CELL,
    candidates: &[Candidate::new("rustcrypto/md4", msdcc_kernel as DccKernel)],
    self_test: msdcc_self_test,
};

pub static MSDCC2: DccHandler = DccHandler {
    desc: &HandlerDescriptor {
        scheme_id: "msdcc2",
        idents: &[],
        salt: None,
        rounds: None,
        checksum_len: 32,
        truncate_size: None,
    },
    cell: &MSDCC2_CELL,
    candidates: &[Candidate::new(
        "rustcrypto/md4+pbkdf2-sha1",
        msdcc2_kernel as DccKernel,
    )],
    self_test: msdcc2_self_test,
};

static MSDCC_CELL: BackendCell<DccKernel> = BackendCell::new();
static MSDCC2_CELL: BackendCell<DccKernel> = BackendCell::new();

fn msdcc_kernel(secret: &[u8], user: &str) -> [u8; 16] {
    let mut h = Md4::new();
    h.update(utf16le(secret));
    let inner: [u8; 16] = h.finalize().into();
    let mut h = Md4::new();
    h.update(inner);
    h.update(utf16le(user.to_lowercase().as_bytes()));
    h.finalize().into()
}

// v2 的固定参数：10240 轮，16 字节输出
fn msdcc2_kernel(secret: &[u8], user: &str) -> [u8; 16] {
    let user16 = utf16le(user.to_lowercase().as_bytes());
    let dcc1 = msdcc_kernel(secret, user);
    let mut out = [0u8; 16];
    pbkdf2::pbkdf2_hmac::<Sha1>(&dcc1, &user16, 10_240, &mut out);
    out
}

// mscash("test1", user "test1") 的公开已知答案
fn msdcc_self_test(kernel: &DccKernel) -> bool {
    hex_encode(&kernel(b"test1", "test1")) == "64cd29e36a8431a2b111378564a10631"
}

// mscash2("test1", user "test1") 的公开已知答案
fn msdcc2_self_test(kernel: &DccKernel) -> bool {
    hex_encode(&kernel(b"test1", "test1")) == "607bbe89611e37446e736f7856515bf8"
}

/// msdcc 家族适配器，两个版本只差内核
pub struct DccHandler {
    desc: &'static HandlerDescriptor,
    cell: &'static BackendCell<DccKernel>,
    candidates: &'static [Candidate<DccKernel>],
    self_test: fn(&DccKernel) -> bool,
}

impl DccHandler {
    fn kernel(&self) -> Result<DccKernel> {
        self.cell
            .get_or_select(self.candidates, self.self_test)
            .map(|s| s.kernel)
            .ok_or_else(|| Error::BackendUnavailable(self.desc.scheme_id.to_string()))
    }
}

impl Handler for DccHandler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        is_lower_hex(hash, 32)
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        if !is_lower_hex(hash, 32) {
            return Err(Error::malformed("checksum is not 32 lowercase hex digits"));
        }
        let mut record = HashRecord::config(self.desc.scheme_id, Vec::new());
        record.checksum = hex_decode(hash)?;
        record.raw = Some(hash.to_string());
        Ok(record)
    }

    fn encode(&self, record: &HashRecord) -> Result<String> {
        if record.checksum.len() != 16 {
            return Err(Error::malformed("checksum must be 16 bytes"));
        }
        Ok(hex_encode(&record.checksum))
    }

    fn genconfig(&self, _policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord> {
        if rounds.is_some() {
            return Err(Error::invalid_policy("scheme accepts no rounds parameter"));
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
        Ok(hex_encode(&kernel(secret, user)))
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
        consteq(&kernel(secret, user), &record.checksum)
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
