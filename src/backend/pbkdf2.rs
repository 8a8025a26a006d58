//! pbkdf2 内核
//!
//! 首选 `pbkdf2` crate 的实现，备有一个 vendored 的 HMAC 迭代回退
//! 实现（直接基于 `hmac` + `sha2` 展开 RFC 2898 的 F 函数）。
//! 两者都要先通过 RFC 自检向量才会被选中。

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// pbkdf2 内核签名：(secret, salt, rounds, out)
pub type Pbkdf2Kernel = fn(&[u8], &[u8], u32, &mut [u8]);

/// `pbkdf2` crate 的 HMAC-SHA256 内核
pub fn rustcrypto_sha256(secret: &[u8], salt: &[u8], rounds: u32, out: &mut [u8]) {
    pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, rounds, out);
}

/// `pbkdf2` crate 的 HMAC-SHA512 内核
pub fn rustcrypto_sha512(secret: &[u8], salt: &[u8], rounds: u32, out: &mut [u8]) {
    pbkdf2::pbkdf2_hmac::<Sha512>(secret, salt, rounds, out);
}

macro_rules! fallback_impl {
    ($name:ident, $mac:ty, $hash_len:expr) => {
        /// vendored HMAC 迭代回退：RFC 2898 的 F 函数，
        /// U1 = HMAC(P, S || INT(i))，Ui 逐轮异或
        pub fn $name(secret: &[u8], salt: &[u8], rounds: u32, out: &mut [u8]) {
            let mut block_index = 1u32;
            for chunk in out.chunks_mut($hash_len) {
                // HMAC 接受任意长度密钥，new_from_slice 不会失败
                let Ok(mut mac) = <$mac>::new_from_slice(secret) else {
                    return;
                };
                mac.update(salt);
                mac.update(&block_index.to_be_bytes());
                let mut u = mac.finalize().into_bytes();
                let mut acc = u;
                for _ in 1..rounds {
                    let Ok(mut mac) = <$mac>::new_from_slice(secret) else {
                        return;
                    };
                    mac.update(&u);
                    u = mac.finalize().into_bytes();
                    for (a, b) in acc.iter_mut().zip(u.iter()) {
                        *a ^= b;
                    }
                }
                chunk.copy_from_slice(&acc[..chunk.len()]);
                block_index += 1;
            }
        }
    };
}

fallback_impl!(fallback_sha256, HmacSha256, 32);
fallback_impl!(fallback_sha512, HmacSha512, 64);
