//! Handler 契约模块
//!
//! 每个具体哈希方案实现一个 [`Handler`]：identify / parse / encode /
//! genconfig / hash / verify / needs_update。数值内核本身是外部协作者
//! （平台 crate 或 vendored 实现），Handler 只负责方案语义与编码。
//!
//! 能力通过 [`HandlerDescriptor`] 的显式字段存在性表达（有无 salt、
//! 有无 rounds、cost 的标度），而不是继承层次。
//!
//! ## 示例
//!
//! ```rust
//! use passrs::handler::{Handler, SchemePolicy};
//! use passrs::registry;
//!
//! let handler = registry::get("pbkdf2_sha256").unwrap();
//! let hash = handler.hash(b"secret", None, &SchemePolicy::default()).unwrap();
//! assert!(handler.identify(&hash));
//! assert!(handler.verify(b"secret", &hash));
//! assert!(!handler.verify(b"wrong", &hash));
//! ```

#[cfg(feature = "argon2")]
pub mod argon2;
#[cfg(feature = "bcrypt")]
pub mod bcrypt;
pub mod digests;
pub mod md5_crypt;
pub mod nthash;
pub mod pbkdf2;
pub mod postgres;
#[cfg(feature = "scrypt")]
pub mod scrypt;
pub mod sha_crypt;
pub mod windows;

use crate::codec::HashRecord;
use crate::error::{Error, Result};
use crate::policy::RoundsPolicy;

/// 任何方案都不接受超过此长度的明文
///
/// 这是对拒绝服务的防线：没有正当密码会接近这个长度。
pub const MAX_SECRET_SIZE: usize = 4096;

/// cost 参数的标度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostScale {
    /// rounds 即迭代次数（pbkdf2、sha-crypt）
    Linear,
    /// rounds 是以 2 为底的指数（bcrypt 的 cost、scrypt 的 ln）
    Log2,
}

/// 盐的规格
#[derive(Debug, Clone, Copy)]
pub struct SaltSpec {
    /// 最小长度（字节或字符，按方案的盐表示而定）
    pub min_len: usize,
    /// 最大长度
    pub max_len: usize,
    /// genconfig 生成的默认长度
    pub default_len: usize,
}

/// cost 参数的规格
#[derive(Debug, Clone, Copy)]
pub struct RoundsSpec {
    /// 方案声明的最小值
    pub min: u32,
    /// 方案声明的最大值
    pub max: u32,
    /// 默认值
    pub default: u32,
    /// 标度
    pub scale: CostScale,
}

/// Handler 的不可变描述符
///
/// 进程启动时注册一次，整个进程生命周期内只读共享。
/// `salt`/`rounds` 的 `Option` 存在性就是该方案的能力声明。
#[derive(Debug, Clone, Copy)]
pub struct HandlerDescriptor {
    /// 方案标识
    pub scheme_id: &'static str,
    /// 可识别的前缀集合；空表示定长遗留格式，靠长度+字符类判定
    pub idents: &'static [&'static str],
    /// 盐规格；`None` 表示无盐方案
    pub salt: Option<SaltSpec>,
    /// cost 规格；`None` 表示固定代价方案
    pub rounds: Option<RoundsSpec>,
    /// 编码后校验和长度；0 表示可变
    pub checksum_len: usize,
    /// 方案的有效输入上限（如 bcrypt 的 72 字节）；超出部分按策略截断或报错
    pub truncate_size: Option<usize>,
}

/// 单个方案视角下已解析的策略覆盖
///
/// 由 `CryptContext` 从 `PolicySpec` 为每个方案解析出来；
/// 直接调用 Handler 时可用 `Default` 取全默认行为。
#[derive(Debug, Clone, Default)]
pub struct SchemePolicy {
    /// 策略要求的最小 rounds
    pub min_rounds: Option<u32>,
    /// 策略要求的最大 rounds
    pub max_rounds: Option<u32>,
    /// 策略指定的默认 rounds
    pub default_rounds: Option<u32>,
    /// vary rounds 抖动比例，0.0..=1.0
    pub vary_rounds: Option<f64>,
    /// 明文超过方案截断长度时报错而不是静默截断
    pub truncate_error: bool,
}

/// 一个哈希方案的多态单元
///
/// 实现是无状态且进程级只读的，多线程并发调用无需加锁。
pub trait Handler: Send + Sync {
    /// 方案描述符
    fn descriptor(&self) -> &'static HandlerDescriptor;

    /// 廉价的语法判定：前缀/长度/字符类，不做完整解析，不触发内核
    fn identify(&self, hash: &str) -> bool;

    /// 完整解析存储文本为结构化记录
    fn parse(&self, hash: &str) -> Result<HashRecord>;

    /// 把记录序列化回文本；必须逐字节重现方案期望的字段顺序
    fn encode(&self, record: &HashRecord) -> Result<String>;

    /// 生成一条带新鲜盐的配置记录
    ///
    /// # Arguments
    ///
    /// * `policy` - 策略覆盖，决定默认 rounds 与钳制范围
    /// * `rounds` - 显式 cost 请求；越界时返回 `RoundsOutOfRange` 而不是钳制
    fn genconfig(&self, policy: &SchemePolicy, rounds: Option<u32>) -> Result<HashRecord>;

    /// 对明文计算完整哈希文本
    ///
    /// `config` 给定时固定使用其盐与参数（如重现已知哈希），
    /// 否则内部走一次 `genconfig`。
    fn hash(&self, secret: &[u8], config: Option<&HashRecord>, policy: &SchemePolicy)
    -> Result<String>;

    /// 校验明文与存储哈希是否匹配
    ///
    /// 任何解析失败都返回 `false` 而不是错误：无法解析的存储哈希
    /// 就是"不匹配"，不是协议错误。比较必须是常量时间的。
    fn verify(&self, secret: &[u8], hash: &str) -> bool;

    /// 方案是否以调用期用户名作盐（postgres_md5、msdcc 等）
    ///
    /// 这类方案的 `hash` 返回 [`Error::UserRequired`]、`verify`
    /// 永远 `false`；必须走 `hash_with_user` / `verify_with_user`。
    fn user_keyed(&self) -> bool {
        false
    }

    /// 携带用户名计算哈希；非 user-keyed 方案忽略用户名
    fn hash_with_user(
        &self,
        secret: &[u8],
        user: &str,
        config: Option<&HashRecord>,
        policy: &SchemePolicy,
    ) -> Result<String> {
        let _ = user;
        self.hash(secret, config, policy)
    }

    /// 携带用户名校验；非 user-keyed 方案忽略用户名
    fn verify_with_user(&self, secret: &[u8], user: &str, hash: &str) -> bool {
        let _ = user;
        self.verify(secret, hash)
    }

    /// 记录中的有效 cost 值（考虑方案的隐含默认，如 sha-crypt 的 5000）
    fn stored_rounds(&self, record: &HashRecord) -> Option<u32> {
        record.rounds()
    }

    /// 存储哈希是否低于策略要求、需要重新哈希
    ///
    /// 只判断参数强度；方案本身是否被弃用由 `CryptContext` 叠加判断。
    fn needs_update(&self, hash: &str, policy: &SchemePolicy) -> bool {
        let Ok(record) = self.parse(hash) else {
            return true;
        };
        let Some(spec) = self.descriptor().rounds else {
            return false;
        };
        let Some(rounds) = self.stored_rounds(&record) else {
            return false;
        };
        let min = policy.min_rounds.unwrap_or(spec.min);
        if rounds < min {
            return true;
        }
        if let Some(max) = policy.max_rounds
            && rounds > max
        {
            return true;
        }
        false
    }

    /// 本进程中该方案是否有通过自检的内核后端
    fn available(&self) -> bool {
        true
    }

    /// 已选定后端的名称与降级信息，用于诊断
    fn backend_info(&self) -> crate::backend::BackendInfo {
        crate::backend::BackendInfo::builtin()
    }

    /// 方案标识的便捷访问
    fn scheme_id(&self) -> &'static str {
        self.descriptor().scheme_id
    }
}

/// 常量时间字节比较
///
/// 无论差异出现在哪个位置耗时一致，避免通过计时泄露部分匹配信号。
pub fn consteq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// 校验明文长度
///
/// 超过全局上限一律报错；超过方案截断长度时按策略报错或放行
/// （放行时由方案语义决定截断，如 bcrypt 只吃前 72 字节）。
pub fn validate_secret(
    secret: &[u8],
    desc: &HandlerDescriptor,
    policy: &SchemePolicy,
) -> Result<()> {
    if secret.len() > MAX_SECRET_SIZE {
        return Err(Error::ValueTooLarge {
            max: MAX_SECRET_SIZE,
            actual: secret.len(),
        });
    }
    if let Some(limit) = desc.truncate_size
        && secret.len() > limit
        && policy.truncate_error
    {
        return Err(Error::ValueTooLarge {
            max: limit,
            actual: secret.len(),
        });
    }
    Ok(())
}

/// 从操作系统 CSPRNG 取随机字节作盐
pub(crate) fn generate_salt_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    getrandom::fill(&mut bytes)
        .map_err(|e| Error::Crypto(format!("failed to generate random salt: {:?}", e)))?;
    Ok(bytes)
}

/// 生成 hash64 字母表内的随机盐字符串（crypt(3) 家族的盐是字面字符）
pub(crate) fn generate_salt_hash64(len: usize) -> Result<String> {
    use crate::codec::hash64::HASH64_CHARS;
    let bytes = generate_salt_bytes(len)?;
    Ok(bytes
        .iter()
        .map(|b| HASH64_CHARS[(b & 0x3f) as usize] as char)
        .collect())
}

/// 为方案构造 rounds 策略；无 rounds 能力的方案返回 `None`
pub(crate) fn rounds_policy(
    desc: &HandlerDescriptor,
    policy: &SchemePolicy,
) -> Option<RoundsPolicy> {
    desc.rounds
        .as_ref()
        .map(|spec| RoundsPolicy::new(desc.scheme_id, spec, policy))
}

/// 同上，但方案必须声明 rounds 能力
pub(crate) fn required_rounds_policy(
    desc: &HandlerDescriptor,
    policy: &SchemePolicy,
) -> Result<RoundsPolicy> {
    rounds_policy(desc, policy)
        .ok_or_else(|| Error::Crypto(format!("{}: scheme declares no rounds", desc.scheme_id)))
}
