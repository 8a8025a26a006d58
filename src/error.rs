//! 统一错误类型模块
//!
//! 提供 passrs 库中所有操作的错误类型定义。
//!
//! 错误分类遵循一个核心安全原则：`verify` 内部的解析/格式错误会被吞掉并
//! 归为"不匹配"（布尔 false），损坏的存储哈希绝不能与"密码错误"区分开来。
//! 其余错误（策略构造失败、后端缺失等）在调用时同步返回，绝不重试。

use std::fmt;

/// passrs 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// passrs 库的错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 存储的哈希文本无法解析
    ///
    /// 仅在显式请求解析（`identify` 后的 `parse`、带配置的 `hash`）时出现；
    /// `verify` 内部遇到时返回 `false` 而不是此错误。
    Malformed(String),

    /// 没有任何已启用的 Handler 能识别该哈希文本
    ///
    /// 故意不携带原始文本，避免把敏感的哈希材料写进错误信息或日志。
    UnknownScheme,

    /// 明文长度超过方案允许的最大输入且策略要求报错
    ValueTooLarge {
        /// 允许的最大字节数
        max: usize,
        /// 实际字节数
        actual: usize,
    },

    /// 显式指定的 cost 参数超出允许范围
    ///
    /// 只有显式请求才会触发；默认值越界时会被静默钳制。
    RoundsOutOfRange {
        /// 方案标识
        scheme: String,
        /// 请求的 rounds 值
        rounds: u32,
        /// 允许的最小值
        min: u32,
        /// 允许的最大值
        max: u32,
    },

    /// 策略配置在构造阶段校验失败
    InvalidPolicy(String),

    /// 声明的方案在本进程中没有任何可用的内核后端
    ///
    /// 自检失败的方案会在启动时被排除出注册表（fail closed），
    /// 策略引用这样的方案时返回此错误而不是在首次使用时崩溃。
    BackendUnavailable(String),

    /// 方案要求调用时提供用户名作盐，但调用方没有给
    ///
    /// postgres_md5、msdcc 这类方案的哈希依赖账户名；不带用户名的
    /// `hash` 调用无法产出有意义的结果。
    UserRequired(String),

    /// 内核层计算失败（随机数源、参数构造等）
    Crypto(String),
}

impl Error {
    /// 创建一个格式错误
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::Malformed(msg.into())
    }

    /// 创建一个策略错误
    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        Error::InvalidPolicy(msg.into())
    }
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Malformed(msg) => write!(f, "malformed hash: {}", msg),
            Error::UnknownScheme => write!(f, "hash could not be identified by any enabled scheme"),
            Error::ValueTooLarge { max, actual } => {
                write!(f, "secret too large: maximum {} bytes, got {}", max, actual)
            }
            Error::RoundsOutOfRange {
                scheme,
                rounds,
                min,
                max,
            } => {
                write!(
                    f,
                    "{}: rounds {} outside allowed range {}..={}",
                    scheme, rounds, min, max
                )
            }
            Error::InvalidPolicy(msg) => write!(f, "invalid policy: {}", msg),
            Error::BackendUnavailable(scheme) => {
                write!(f, "no working backend available for scheme '{}'", scheme)
            }
            Error::UserRequired(scheme) => {
                write!(f, "scheme '{}' requires a username to compute this hash", scheme)
            }
            Error::Crypto(msg) => write!(f, "crypto error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
