//! 无前缀的遗留摘要方案
//!
//! hex_md5：32 位小写十六进制的裸 MD5；mysql41：`*` 加 40 位大写
//! 十六进制的 SHA1(SHA1(secret))。二者都没有 `$id$` 前缀，identify
//! 只能靠长度加字符类判定，因此两个判定域刻意互斥：长度不同，
//! 大小写要求相反。

use md5::Md5;
use sha1::{Digest, Sha1};

use crate::backend::{BackendCell, BackendInfo, Candidate};
use crate::codec::{HashRecord, hex_decode, hex_encode, hex_encode_upper, is_lower_hex,
    is_upper_hex};
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerDescriptor, SchemePolicy, consteq, validate_secret};

/// 摘要内核签名
pub type DigestKernel = fn(&[u8]) -> Vec<u8>;

pub static HEX_MD5: DigestHandler = DigestHandler {
    desc: &HandlerDescriptor {
        scheme_id: "hex_md5",
        idents: &[],
        salt: None,
        rounds: None,
        checksum_len: 32,
        truncate_size: None,
    },
    cell: &MD5_CELL,
    candidates: &[Candidate::new("rustcrypto/md5", md5_kernel as DigestKernel)],
    self_test: md5_self_test,
    identify: |hash| is_lower_hex(hash, 32),
    encode_digest: |digest| hex_encode(digest),
    decode_digest: |text| hex_decode(text),
    digest_len: 16,
};

pub static MYSQL41: DigestHandler = DigestHandler {
    desc: &HandlerDescriptor {
        scheme_id: "mysql41",
        idents: &[],
        salt: None,
        rounds: None,
        checksum_len: 41,
        truncate_size: None,
    },
    cell: &MYSQL_CELL,
    candidates: &[Candidate::new(
        "rustcrypto/sha1-double",
        mysql41_kernel as DigestKernel,
    )],
    self_test: mysql41_self_test,
    identify: |hash| hash.starts_with('*') && is_upper_hex(&hash[1..], 40),
    encode_digest: |digest| format!("*{}", hex_encode_upper(digest)),
    decode_digest: |text| {
        let body = text
            .strip_prefix('*')
            .ok_or_else(|| Error::malformed("missing '*' prefix"))?;
        if !is_upper_hex(body, 40) {
            return Err(Error::malformed("checksum is not 40 uppercase hex digits"));
        }
        hex_decode(&body.to_lowercase())
    },
    digest_len: 20,
};

static MD5_CELL: BackendCell<DigestKernel> = BackendCell::new();
static MYSQL_CELL: BackendCell<DigestKernel> = BackendCell::new();

fn md5_kernel(secret: &[u8]) -> Vec<u8> {
    let mut h = Md5::new();
    h.update(secret);
    h.finalize().to_vec()
}

fn mysql41_kernel(secret: &[u8]) -> Vec<u8> {
    let mut h = Sha1::new();
    h.update(secret);
    let inner = h.finalize();
    let mut h = Sha1::new();
    h.update(inner);
    h.finalize().to_vec()
}

// MD5("password") 的公开已知答案
fn md5_self_test(kernel: &DigestKernel) -> bool {
    hex_encode(&kernel(b"password")) == "5f4dcc3b5aa765d61d8327deb882cf99"
}

// SHA1(SHA1("password")) 的公开已知答案（MySQL 4.1 PASSWORD()）
fn mysql41_self_test(kernel: &DigestKernel) -> bool {
    hex_encode_upper(&kernel(b"password")) == "2470C0C06DEE42FD1618BB99005ADCA2EC9D1E19"
}

/// 无盐摘要适配器，由字段闭包区分具体方案
pub struct DigestHandler {
    desc: &'static HandlerDescriptor,
    cell: &'static BackendCell<DigestKernel>,
    candidates: &'static [Candidate<DigestKernel>],
    self_test: fn(&DigestKernel) -> bool,
    identify: fn(&str) -> bool,
    encode_digest: fn(&[u8]) -> String,
    decode_digest: fn(&str) -> Result<Vec<u8>>,
    digest_len: usize,
}

impl DigestHandler {
    fn kernel(&self) -> Result<DigestKernel> {
        self.cell
            .get_or_select(self.candidates, self.self_test)
            .map(|s| s.kernel)
            .ok_or_else(|| Error::BackendUnavailable(self.desc.scheme_id.to_string()))
    }
}

impl Handler for DigestHandler {
    fn descriptor(&self) -> &'static HandlerDescriptor {
        self.desc
    }

    fn identify(&self, hash: &str) -> bool {
        (self.identify)(hash)
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        if !(self.identify)(hash) {
            return Err(Error::malformed("not a recognized digest"));
        }
        let mut record = HashRecord::config(self.desc.scheme_id, Vec::new());
        record.checksum = (self.decode_digest)(hash)?;
        record.raw = Some(hash.to_string());
        Ok(record)
    }

    fn encode(&self, record: &HashRecord) -> Result<String> {
        if record.checksum.len() != self.digest_len {
            return Err(Error::malformed("wrong checksum length"));
        }
        Ok((self.encode_digest)(&record.checksum))
    }

    fn genconfig(&self, _policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord> {
        if rounds.is_some() {
            return Err(Error::invalid_policy("scheme accepts no rounds parameter"));
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
        Ok((self.encode_digest)(&kernel(secret)))
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
        consteq(&kernel(secret), &record.checksum)
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

    #[test]
    fn test_hex_md5_known_answer() {
        let hash = HEX_MD5.hash(b"password", None, &SchemePolicy::default()).unwrap();
        assert_eq!(hash, "5f4dcc3b5aa765d61d8327deb882cf99");
        assert!(HEX_MD5.verify(b"password", &hash));
        assert!(!HEX_MD5.verify(b"passw0rd", &hash));
    }

    #[test]
    fn test_mysql41_known_answer() {
        let hash = MYSQL41.hash(b"password", None, &SchemePolicy::default()).unwrap();
        assert_eq!(hash, "*2470C0C06DEE42FD1618BB99005ADCA2EC9D1E19");
        assert!(MYSQL41.verify(b"password", &hash));
        assert!(!MYSQL41.verify(b"Password", &hash));
    }

    #[test]
    fn test_identify_domains_are_disjoint() {
        let md5 = "5f4dcc3b5aa765d61d8327deb882cf99";
        let mysql = "*2470C0C06DEE42FD1618BB99005ADCA2EC9D1E19";
        assert!(HEX_MD5.identify(md5));
        assert!(!HEX_MD5.identify(mysql));
        assert!(MYSQL41.identify(mysql));
        assert!(!MYSQL41.identify(md5));
        // 大小写不合要求直接判否
        assert!(!HEX_MD5.identify("5F4DCC3B5AA765D61D8327DEB882CF99"));
        assert!(!MYSQL41.identify("*2470c0c06dee42fd1618bb99005adca2ec9d1e19"));
    }

    #[test]
    fn test_parse_encode_round_trip() {
        let mysql = "*2470C0C06DEE42FD1618BB99005ADCA2EC9D1E19";
        let record = MYSQL41.parse(mysql).unwrap();
        assert_eq!(record.checksum.len(), 20);
        assert_eq!(MYSQL41.encode(&record).unwrap(), mysql);
    }
}
