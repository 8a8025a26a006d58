//! md5-crypt 内核（vendored 实现）
//!
//! 经典 `$1$` 算法的 1000 轮固定摘要链，底层压缩函数来自 `md-5`。
//! 输出为 22 字符的 hash64 校验和文本。

use md5::{Digest, Md5};

use crate::codec::hash64::{TransposeGroup, transpose_encode};

/// md5-crypt 内核签名：(secret, salt) -> 编码后的校验和
pub type Md5CryptKernel = fn(&[u8], &[u8]) -> String;

/// 算法内部混入的魔数前缀
const MAGIC: &[u8] = b"$1$";

/// MD5 摘要的输出转置顺序
const MD5_GROUPS: &[TransposeGroup] = &[
    ([0, 6, 12], 4),
    ([1, 7, 13], 4),
    ([2, 8, 14], 4),
    ([3, 9, 15], 4),
    ([4, 10, 5], 4),
    ([-1, -1, 11], 2),
];

/// md5-crypt 校验和
pub fn md5_crypt_checksum(secret: &[u8], salt: &[u8]) -> String {
    // 交替摘要 B = MD5(secret || salt || secret)
    let mut h = Md5::new();
    h.update(secret);
    h.update(salt);
    h.update(secret);
    let b = h.finalize();

    // 主摘要 A：secret || "$1$" || salt，再混入 B 与长度位串
    let mut a = Md5::new();
    a.update(secret);
    a.update(MAGIC);
    a.update(salt);
    let mut cnt = secret.len();
    while cnt > 16 {
        a.update(b);
        cnt -= 16;
    }
    a.update(&b[..cnt]);
    let mut bits = secret.len();
    while bits > 0 {
        if bits & 1 != 0 {
            a.update([0u8]);
        } else {
            a.update(&secret[..1]);
        }
        bits >>= 1;
    }
    let mut c = a.finalize();

    // 固定 1000 轮链式摘要
    for i in 0..1000u32 {
        let mut h = Md5::new();
        if i & 1 != 0 {
            h.update(secret);
        } else {
            h.update(c);
        }
        if i % 3 != 0 {
            h.update(salt);
        }
        if i % 7 != 0 {
            h.update(secret);
        }
        if i & 1 != 0 {
            h.update(c);
        } else {
            h.update(secret);
        }
        c = h.finalize();
    }
    transpose_encode(&c, MD5_GROUPS)
}
