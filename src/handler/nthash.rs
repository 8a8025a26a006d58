//! NT 哈希方案
//!
//! Windows 存储格式：`$3$$` 加 32 位小写十六进制，MD4(UTF-16LE(secret))。
//! 无盐无 cost，纯遗留验证用途。

use md4::{Digest, Md4};

use crate::backend::{BackendCell, BackendInfo, Candidate};
use crate::codec::{HashRecord, hex_decode, hex_encode, is_lower_hex};
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerDescriptor, SchemePolicy, consteq, validate_secret};

pub static NTHASH: NtHashHandler = NtHashHandler {
    desc: &HandlerDescriptor {
        scheme_id: "nthash",
        idents: &["$3$$"],
        salt: None,
        rounds: None,
        checksum_len: 32,
        truncate_size: None,
    },
};

/// nthash 内核签名：UTF-16LE 编码后的字节 -> 16 字节摘要
pub type NtHashKernel = fn(&[u8]) -> [u8; 16];

fn md4_kernel(encoded: &[u8]) -> [u8; 16] {
    let mut h = Md4::new();
    h.update(encoded);
    h.finalize().into()
}

static CELL: BackendCell<NtHashKernel> = BackendCell::new();

static CANDIDATES: &[Candidate<NtHashKernel>] =
    &[Candidate::new("rustcrypto/md4", md4_kernel as NtHashKernel)];

// MD4(UTF-16LE("password")) 的公开已知答案
fn self_test(kernel: &NtHashKernel) -> bool {
    kernel(&utf16le(b"password"))
        == [
            0x88, 0x46, 0xf7, 0xea, 0xee, 0x8f, 0xb1, 0x17, 0xad, 0x06, 0xbd, 0xd8, 0x30, 0xb7,
            0x58, 0x6c,
        ]
}

/// 明文转 UTF-16LE 字节串
///
/// 合法 UTF-8 按 Unicode 码点编码；其余字节按 latin-1 码点逐字节映射，
/// 与历史实现对任意字节输入的行为一致。msdcc 家族复用同一套编码。
pub(crate) fn utf16le(secret: &[u8]) -> Vec<u8> {
    match std::str::from_utf8(secret) {
        Ok(text) => text
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect(),
        Err(_) => secret
            .iter()
            .flat_map(|&b| u16::from(b).to_le_bytes())
            .collect(),
    }
}

pub struct NtHashHandler {
    desc: &'static HandlerDescriptor,
}

impl NtHashHandler {
    fn kernel(&self) -> Result<NtHashKernel> {
        CELL.get_or_select(CANDIDATES, self_test)
            .map(|s| s.kernel)
            .ok_or_else(|| Error::BackendUnavailable(self.desc.scheme_id.to_string()))
    }
}

impl Handler for NtHashHandler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        hash.strip_prefix("$3$$")
            .is_some_and(|rest| is_lower_hex(rest, 32))
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let digest = hash
            .strip_prefix("$3$$")
            .ok_or_else(|| Error::malformed("unexpected prefix"))?;
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
        Ok(format!("$3$${}", hex_encode(&record.checksum)))
    }

    fn genconfig(&self, _policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord> {
        if rounds.is_some() {
            return Err(Error::invalid_policy("nthash accepts no rounds parameter"));
        }
        Ok(HashRecord::config(self.desc.scheme_id, Vec::new()))
    }

    fn hash(
        &self,
        secret: &[u8],
        _config: Option<&HashRecord>,
        policy: &SchemePolicy,
    ) -> Result<String> {
        validate_secret(secret, self.desc, policy)?;
        let kernel = self.kernel()?;
        let digest = kernel(&utf16le(secret));
        Ok(format!("$3$${}", hex_encode(&digest)))
    }

    fn verify(&self, secret: &[u8], hash: &str) -> bool {
        if secret.len() > crate::handler::MAX_SECRET_SIZE {
            return false;
        }
        let Ok(record) = self.parse(hash) else {
            return false;
        };
        let Ok(kernel) = self.kernel() else {
            return false;
        };
        let digest = kernel(&utf16le(secret));
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
