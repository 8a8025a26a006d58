//! Modular Crypt Format 编解码模块
//!
//! 提供 `$id$param$salt$digest` 风格编码的通用解析/序列化原语，以及
//! 无分隔符的定长遗留格式所需的字符类校验工具。本模块不了解任何具体
//! 方案的语义：字段顺序、字母表选择由各 Handler 自己声明。
//!
//! 解析是**全量且严格**的：超出声明字母表的字节、超出声明数量的参数、
//! 长度不匹配一律返回 [`Error::Malformed`]，绝不静默截断或强制转换。
//!
//! ## 示例
//!
//! ```rust
//! use passrs::codec::{parse_mc3, render_mc3};
//!
//! let (rounds, explicit, salt, chk) =
//!     parse_mc3("$pbkdf2-sha256$29000$abc$def", "$pbkdf2-sha256$", None).unwrap();
//! assert_eq!(rounds, 29000);
//! assert!(explicit);
//! assert_eq!(salt, "abc");
//! assert_eq!(chk, Some("def"));
//!
//! let text = render_mc3("$pbkdf2-sha256$", Some(29000), "abc", "def");
//! assert_eq!(text, "$pbkdf2-sha256$29000$abc$def");
//! ```

pub mod hash64;

use base64::Engine as _;
use base64::alphabet::Alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};

use crate::error::{Error, Result};

/// passlib 风格的 "adapted base64"：标准 base64 把 `+` 换成 `.`，无填充
///
/// pbkdf2 家族的盐和校验和使用此编码。
const AB64_ALPHABET: Alphabet = match Alphabet::new(
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789./",
) {
    Ok(a) => a,
    Err(_) => panic!("invalid ab64 alphabet"),
};

/// adapted base64 引擎
pub const AB64: GeneralPurpose = GeneralPurpose::new(&AB64_ALPHABET, NO_PAD);

/// 哈希记录中的参数值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// 数值参数（rounds、m、t、p 等）
    Int(u64),
    /// 文本参数（ident 变体等）
    Str(String),
}

/// 一条已解析的哈希记录
///
/// 由 `Handler::parse` 在每次 identify/verify 调用中构造，使用后即丢弃，
/// 本层不做任何持久化。参数保持方案声明的原始顺序，保证
/// `handler.encode(handler.parse(s)?)? == s` 字节级成立。
#[derive(Debug, Clone)]
pub struct HashRecord {
    /// 方案标识（如 "bcrypt"、"pbkdf2_sha256"）
    pub scheme_id: String,
    /// 有序参数表
    pub params: Vec<(String, ParamValue)>,
    /// 盐。对 crypt(3) 家族是字面 hash64 字符的 ASCII 字节，
    /// 对 PHC/pbkdf2 家族是解码后的原始字节，由方案自己声明。
    pub salt: Vec<u8>,
    /// 校验和，约定同上；genconfig 产物中为空
    pub checksum: Vec<u8>,
    /// 解析来源的原始文本；不参与相等比较
    pub raw: Option<String>,
}

impl HashRecord {
    /// 创建一条不带校验和的配置记录
    pub fn config(scheme_id: &str, salt: Vec<u8>) -> Self {
        HashRecord {
            scheme_id: scheme_id.to_string(),
            params: Vec::new(),
            salt,
            checksum: Vec::new(),
            raw: None,
        }
    }

    /// 追加一个参数，保持插入顺序
    pub fn push_param(&mut self, key: &str, value: ParamValue) {
        self.params.push((key.to_string(), value));
    }

    /// 按键查找数值参数
    pub fn int_param(&self, key: &str) -> Option<u64> {
        self.params.iter().find_map(|(k, v)| match v {
            ParamValue::Int(n) if k == key => Some(*n),
            _ => None,
        })
    }

    /// 按键查找文本参数
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.iter().find_map(|(k, v)| match v {
            ParamValue::Str(s) if k == key => Some(s.as_str()),
            _ => None,
        })
    }

    /// 记录中的 rounds 参数（若有）
    pub fn rounds(&self) -> Option<u32> {
        self.int_param("rounds").and_then(|n| u32::try_from(n).ok())
    }
}

// raw 只是解析痕迹，不参与语义相等：genconfig 记录（raw=None）与
// 对其编码结果重新 parse 得到的记录（raw=Some）必须相等。
impl PartialEq for HashRecord {
    fn eq(&self, other: &Self) -> bool {
        self.scheme_id == other.scheme_id
            && self.params == other.params
            && self.salt == other.salt
            && self.checksum == other.checksum
    }
}

impl Eq for HashRecord {}

// ============================================================================
// MCF 解析/渲染原语
// ============================================================================

/// 解析两段式 MCF 哈希：`{prefix}{salt}[${checksum}]`
///
/// md5_crypt 等方案使用此布局。
///
/// # Returns
///
/// `(salt, checksum)` 元组；配置串没有校验和时后者为 `None`。
pub fn parse_mc2<'a>(hash: &'a str, prefix: &str) -> Result<(&'a str, Option<&'a str>)> {
    let rest = hash
        .strip_prefix(prefix)
        .ok_or_else(|| Error::malformed("unexpected prefix"))?;
    let mut parts = rest.split('$');
    let salt = parts.next().unwrap_or("");
    let chk = parts.next();
    if parts.next().is_some() {
        return Err(Error::malformed("too many fields"));
    }
    match chk {
        Some("") => Err(Error::malformed("empty checksum field")),
        other => Ok((salt, other)),
    }
}

/// 解析三段式 MCF 哈希：`{prefix}[rounds$]{salt}[${checksum}]`
///
/// # Arguments
///
/// * `default_rounds` - rounds 字段缺省时的隐含值；`None` 表示该字段必填
///
/// # Returns
///
/// `(rounds, explicit, salt, checksum)`；`explicit` 标记 rounds 字段是否
/// 真实出现在文本里，序列化时必须原样保留这一点。
pub fn parse_mc3<'a>(
    hash: &'a str,
    prefix: &str,
    default_rounds: Option<u32>,
) -> Result<(u32, bool, &'a str, Option<&'a str>)> {
    let rest = hash
        .strip_prefix(prefix)
        .ok_or_else(|| Error::malformed("unexpected prefix"))?;
    let fields: Vec<&str> = rest.split('$').collect();
    let (rounds_field, salt, chk) = match fields.as_slice() {
        [rounds, salt, chk] => (Some(*rounds), *salt, Some(*chk)),
        [rounds, salt] => (Some(*rounds), *salt, None),
        _ => return Err(Error::malformed("wrong number of fields")),
    };
    let (rounds, explicit) = match rounds_field {
        Some("") => return Err(Error::malformed("empty rounds field")),
        Some(text) => (parse_int_field(text, "rounds")?, true),
        None => match default_rounds {
            Some(d) => (d, false),
            None => return Err(Error::malformed("missing rounds field")),
        },
    };
    if chk == Some("") {
        return Err(Error::malformed("empty checksum field"));
    }
    Ok((rounds, explicit, salt, chk))
}

/// 序列化两段式 MCF 哈希；[`parse_mc2`] 的逆操作
pub fn render_mc2(prefix: &str, salt: &str, checksum: &str) -> String {
    if checksum.is_empty() {
        format!("{}{}", prefix, salt)
    } else {
        format!("{}{}${}", prefix, salt, checksum)
    }
}

/// 序列化三段式 MCF 哈希；[`parse_mc3`] 的逆操作
///
/// `rounds` 为 `None` 时表示该字段隐含，不输出。
pub fn render_mc3(prefix: &str, rounds: Option<u32>, salt: &str, checksum: &str) -> String {
    let mut out = String::from(prefix);
    if let Some(r) = rounds {
        out.push_str(&r.to_string());
        out.push('$');
    }
    out.push_str(salt);
    if !checksum.is_empty() {
        out.push('$');
        out.push_str(checksum);
    }
    out
}

/// 严格解析一个十进制整数字段
///
/// 空字段与零填充（"0042"）一律拒绝：零填充会造成同一哈希存在多种
/// 编码，破坏字节级往返不变式。
pub fn parse_int_field(source: &str, param: &str) -> Result<u32> {
    if source.is_empty() {
        return Err(Error::Malformed(format!("empty {} field", param)));
    }
    if source.starts_with('0') && source != "0" {
        return Err(Error::Malformed(format!("zero-padded {} field", param)));
    }
    source
        .parse::<u32>()
        .map_err(|_| Error::Malformed(format!("invalid {} field", param)))
}

// ============================================================================
// 字符类与十六进制工具
// ============================================================================

/// 判断字符串是否为指定长度的小写十六进制
pub fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len
        && s.chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// 判断字符串是否为指定长度的大写十六进制
pub fn is_upper_hex(s: &str, len: usize) -> bool {
    s.len() == len
        && s.chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

/// 字节序列转小写十六进制
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 字节序列转大写十六进制
pub fn hex_encode_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// 小写/大写十六进制解码，非法字符返回 `Malformed`
pub fn hex_decode(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(Error::malformed("odd-length hex field"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| Error::malformed("invalid hex digit"))
        })
        .collect()
}

/// adapted base64 编码
pub fn ab64_encode(bytes: &[u8]) -> String {
    AB64.encode(bytes)
}

/// adapted base64 严格解码
pub fn ab64_decode(s: &str) -> Result<Vec<u8>> {
    AB64.decode(s)
        .map_err(|_| Error::malformed("invalid adapted-base64 field"))
}
