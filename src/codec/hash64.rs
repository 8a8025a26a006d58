//! crypt(3) 家族使用的 hash64 字母表
//!
//! `./0-9A-Za-z` 不是标准 base64：md5-crypt 与 sha-crypt 按 24 位一组
//! 小端序输出字符，并且每个方案对摘要字节有各自公开的转置顺序。
//! 这里只提供字母表与小端编码原语，转置表由各内核自己声明。

/// hash64 字母表，按编码值顺序排列
pub const HASH64_CHARS: &[u8; 64] =
    b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// 判断字符是否属于 hash64 字母表
pub fn is_hash64_char(c: char) -> bool {
    matches!(c, '.' | '/' | '0'..='9' | 'A'..='Z' | 'a'..='z')
}

/// 判断整个字符串是否只由 hash64 字符组成
pub fn is_hash64(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_hash64_char)
}

/// 摘要字节的转置分组：三个字节索引（-1 表示补零）与输出字符数
pub type TransposeGroup = ([i8; 3], u8);

/// 按方案声明的转置顺序把原始摘要编码成 hash64 文本
///
/// 每组取三个摘要字节拼成 24 位字（高位在前），再按小端序每次取 6 位
/// 输出一个字符。末组不足三字节时用 0 补齐并输出更少的字符，
/// 与各方案参考实现中的 `b64_from_24bit` 一致。
pub fn transpose_encode(digest: &[u8], groups: &[TransposeGroup]) -> String {
    let mut out = String::with_capacity(groups.len() * 4);
    for (idx, n) in groups {
        let byte = |i: i8| -> u32 {
            if i < 0 { 0 } else { u32::from(digest[i as usize]) }
        };
        let mut w = (byte(idx[0]) << 16) | (byte(idx[1]) << 8) | byte(idx[2]);
        for _ in 0..*n {
            out.push(HASH64_CHARS[(w & 0x3f) as usize] as char);
            w >>= 6;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_order() {
        // 字母表顺序决定编码值，不能改动
        assert_eq!(HASH64_CHARS[0], b'.');
        assert_eq!(HASH64_CHARS[1], b'/');
        assert_eq!(HASH64_CHARS[2], b'0');
        assert_eq!(HASH64_CHARS[12], b'A');
        assert_eq!(HASH64_CHARS[38], b'a');
        assert_eq!(HASH64_CHARS[63], b'z');
    }

    #[test]
    fn test_is_hash64() {
        assert!(is_hash64("abcXYZ012./"));
        assert!(!is_hash64(""));
        assert!(!is_hash64("abc$def"));
        assert!(!is_hash64("abc def"));
    }

    #[test]
    fn test_transpose_encode_single_group() {
        // w = 0 -> 四个 '.' 字符
        let digest = [0u8; 3];
        let groups: &[TransposeGroup] = &[([0, 1, 2], 4)];
        assert_eq!(transpose_encode(&digest, groups), "....");
    }

    #[test]
    fn test_transpose_encode_little_endian() {
        // w = 0x000001 -> 最低 6 位为 1 -> '/', 其余为 '.'
        let digest = [0u8, 0u8, 1u8];
        let groups: &[TransposeGroup] = &[([0, 1, 2], 4)];
        assert_eq!(transpose_encode(&digest, groups), "/...");
    }

    #[test]
    fn test_transpose_encode_padding_group() {
        let digest = [0xffu8];
        let groups: &[TransposeGroup] = &[([-1, -1, 0], 2)];
        // w = 0xff -> 低 6 位 = 63 ('z')，次 6 位 = 3 ('1')
        assert_eq!(transpose_encode(&digest, groups), "z1");
    }
}
