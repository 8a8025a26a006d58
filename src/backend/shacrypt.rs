//! sha-crypt 内核（vendored 实现）
//!
//! SHA-256/512 crypt 的摘要链循环，按公开参考规范实现，底层压缩函数
//! 来自 `sha2`。输出是已按方案转置顺序编码的 hash64 校验和文本
//! （sha256 为 43 字符，sha512 为 86 字符）。

use sha2::digest::Digest;
use sha2::{Sha256, Sha512};

use crate::codec::hash64::{TransposeGroup, transpose_encode};

/// sha-crypt 内核签名：(secret, salt, rounds) -> 编码后的校验和
pub type ShaCryptKernel = fn(&[u8], &[u8], u32) -> String;

/// SHA-256 摘要的输出转置顺序
const SHA256_GROUPS: &[TransposeGroup] = &[
    ([0, 10, 20], 4),
    ([21, 1, 11], 4),
    ([12, 22, 2], 4),
    ([3, 13, 23], 4),
    ([24, 4, 14], 4),
    ([15, 25, 5], 4),
    ([6, 16, 26], 4),
    ([27, 7, 17], 4),
    ([18, 28, 8], 4),
    ([9, 19, 29], 4),
    ([-1, 31, 30], 3),
];

/// SHA-512 摘要的输出转置顺序
const SHA512_GROUPS: &[TransposeGroup] = &[
    ([0, 21, 42], 4),
    ([22, 43, 1], 4),
    ([44, 2, 23], 4),
    ([3, 24, 45], 4),
    ([25, 46, 4], 4),
    ([47, 5, 26], 4),
    ([6, 27, 48], 4),
    ([28, 49, 7], 4),
    ([50, 8, 29], 4),
    ([9, 30, 51], 4),
    ([31, 52, 10], 4),
    ([53, 11, 32], 4),
    ([12, 33, 54], 4),
    ([34, 55, 13], 4),
    ([56, 14, 35], 4),
    ([15, 36, 57], 4),
    ([37, 58, 16], 4),
    ([59, 17, 38], 4),
    ([18, 39, 60], 4),
    ([40, 61, 19], 4),
    ([62, 20, 41], 4),
    ([-1, -1, 63], 2),
];

/// sha256-crypt 校验和
pub fn sha256_crypt_checksum(secret: &[u8], salt: &[u8], rounds: u32) -> String {
    let digest = sha_crypt_raw::<Sha256>(secret, salt, rounds);
    transpose_encode(&digest, SHA256_GROUPS)
}

/// sha512-crypt 校验和
pub fn sha512_crypt_checksum(secret: &[u8], salt: &[u8], rounds: u32) -> String {
    let digest = sha_crypt_raw::<Sha512>(secret, salt, rounds);
    transpose_encode(&digest, SHA512_GROUPS)
}

/// 摘要链主循环，对 SHA-256/512 通用
fn sha_crypt_raw<D: Digest>(secret: &[u8], salt: &[u8], rounds: u32) -> Vec<u8> {
    let block = <D as Digest>::output_size();

    // 交替摘要 B = H(secret || salt || secret)
    let mut h = D::new();
    h.update(secret);
    h.update(salt);
    h.update(secret);
    let b = h.finalize();

    // 主摘要 A：secret || salt，再按 secret 长度混入 B
    let mut a = D::new();
    a.update(secret);
    a.update(salt);
    let mut cnt = secret.len();
    while cnt > block {
        a.update(&b);
        cnt -= block;
    }
    a.update(&b[..cnt]);
    let mut bits = secret.len();
    while bits > 0 {
        if bits & 1 != 0 {
            a.update(&b);
        } else {
            a.update(secret);
        }
        bits >>= 1;
    }
    let mut alt = a.finalize();

    // P 序列：H(secret 重复 len(secret) 次) 循环填充到 len(secret)
    let mut h = D::new();
    for _ in 0..secret.len() {
        h.update(secret);
    }
    let dp = h.finalize();
    let p = repeat_to(&dp, secret.len());

    // S 序列：H(salt 重复 16 + alt[0] 次) 循环填充到 len(salt)
    let mut h = D::new();
    for _ in 0..(16 + usize::from(alt[0])) {
        h.update(salt);
    }
    let ds = h.finalize();
    let s = repeat_to(&ds, salt.len());

    // rounds 轮链式摘要
    for i in 0..rounds {
        let mut h = D::new();
        if i & 1 != 0 {
            h.update(&p);
        } else {
            h.update(&alt);
        }
        if i % 3 != 0 {
            h.update(&s);
        }
        if i % 7 != 0 {
            h.update(&p);
        }
        if i & 1 != 0 {
            h.update(&alt);
        } else {
            h.update(&p);
        }
        alt = h.finalize();
    }
    alt.to_vec()
}

fn repeat_to(block: &[u8], len: usize) -> Vec<u8> {
    block.iter().copied().cycle().take(len).collect()
}
