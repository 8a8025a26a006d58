//! CryptContext 策略引擎
//!
//! 把一组方案、一个默认方案、弃用名单与各方案的 cost 覆盖组合成
//! 一个不可变的验证/迁移入口。上下文构造后不再变化，更新策略就
//! 构造一个新上下文，旧引用继续安全可用，多线程共享无需加锁。
//!
//! ## 示例
//!
//! ```rust
//! use passrs::context::{CryptContext, PolicySpec};
//!
//! let policy = PolicySpec::builder()
//!     .schemes(["pbkdf2_sha256", "md5_crypt"])
//!     .default_scheme("pbkdf2_sha256")
//!     .deprecate("md5_crypt")
//!     .build()
//!     .unwrap();
//! let ctx = CryptContext::new(policy).unwrap();
//!
//! let hash = ctx.hash(b"secret").unwrap();
//! let outcome = ctx.verify(b"secret", &hash).unwrap();
//! assert!(outcome.matched);
//! assert!(!outcome.needs_update);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::handler::{Handler, MAX_SECRET_SIZE, SchemePolicy};
use crate::registry;

// ============================================================================
// 策略描述
// ============================================================================

/// 单个方案的 cost 覆盖
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SchemeOverrides {
    /// 最小 rounds
    pub min_rounds: Option<u32>,
    /// 最大 rounds
    pub max_rounds: Option<u32>,
    /// 默认 rounds
    pub default_rounds: Option<u32>,
    /// 抖动比例，0.0..=1.0
    pub vary_rounds: Option<f64>,
}

/// 一份校验过的上下文策略
///
/// 只能经 [`PolicyBuilder`]、[`PolicySpec::from_options`] 或
/// [`PolicyConfig`] 构造，构造成功即保证结构一致性。
#[derive(Debug, Clone)]
pub struct PolicySpec {
    schemes: Vec<String>,
    default_scheme: String,
    deprecated: HashSet<String>,
    overrides: HashMap<String, SchemeOverrides>,
    truncate_error: bool,
}

impl PolicySpec {
    /// 创建一个策略构造器
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    /// 启用的方案，按 identify 优先顺序
    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }

    /// 新哈希使用的方案
    pub fn default_scheme(&self) -> &str {
        &self.default_scheme
    }

    /// 方案是否被标记为弃用
    pub fn is_deprecated(&self, scheme: &str) -> bool {
        self.deprecated.contains(scheme)
    }

    /// 合成某方案视角的策略覆盖
    pub fn scheme_policy(&self, scheme: &str) -> SchemePolicy {
        let ov = self.overrides.get(scheme).copied().unwrap_or_default();
        SchemePolicy {
            min_rounds: ov.min_rounds,
            max_rounds: ov.max_rounds,
            default_rounds: ov.default_rounds,
            vary_rounds: ov.vary_rounds,
            truncate_error: self.truncate_error,
        }
    }

    /// Linux shadow 世系的预置策略
    ///
    /// sha512_crypt 生成新哈希，sha256_crypt 继续验证，md5_crypt
    /// 只为旧库存保留并标记弃用。
    pub fn linux_defaults() -> PolicySpec {
        PolicySpec {
            schemes: vec![
                "sha512_crypt".to_string(),
                "sha256_crypt".to_string(),
                "md5_crypt".to_string(),
            ],
            default_scheme: "sha512_crypt".to_string(),
            deprecated: HashSet::from(["md5_crypt".to_string()]),
            overrides: HashMap::new(),
            truncate_error: false,
        }
    }

    /// BSD 世系的预置策略
    ///
    /// bcrypt 生成新哈希；md5_crypt 与 NT 哈希库存仍可验证，
    /// 验证成功即报告迁移。
    #[cfg(feature = "bcrypt")]
    pub fn bsd_defaults() -> PolicySpec {
        PolicySpec {
            schemes: vec![
                "bcrypt".to_string(),
                "md5_crypt".to_string(),
                "nthash".to_string(),
            ],
            default_scheme: "bcrypt".to_string(),
            deprecated: HashSet::from(["md5_crypt".to_string(), "nthash".to_string()]),
            overrides: HashMap::new(),
            truncate_error: false,
        }
    }

    /// 从字符串键值对构造策略（配置文件/环境变量表面）
    ///
    /// 支持的键：`schemes`（逗号分隔）、`default`、`deprecated`
    /// （逗号分隔）、`truncate_error`，以及
    /// `<scheme>__min_rounds` / `__max_rounds` / `__default_rounds` /
    /// `__vary_rounds`（接受 `0.1` 或 `10%` 两种写法）。
    pub fn from_options<'a, I>(options: I) -> Result<PolicySpec>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut builder = PolicyBuilder::default();
        for (key, value) in options {
            match key {
                "schemes" => {
                    builder = builder.schemes(value.split(',').map(str::trim));
                }
                "default" => {
                    builder = builder.default_scheme(value.trim());
                }
                "deprecated" => {
                    for scheme in value.split(',') {
                        builder = builder.deprecate(scheme.trim());
                    }
                }
                "truncate_error" => {
                    let flag = match value.trim() {
                        "true" => true,
                        "false" => false,
                        other => {
                            return Err(Error::InvalidPolicy(format!(
                                "truncate_error must be true or false, got '{}'",
                                other
                            )));
                        }
                    };
                    builder = builder.truncate_error(flag);
                }
                _ => {
                    let (scheme, option) = key.split_once("__").ok_or_else(|| {
                        Error::InvalidPolicy(format!("unknown policy key '{}'", key))
                    })?;
                    builder = match option {
                        "min_rounds" => builder.min_rounds(scheme, parse_u32(key, value)?),
                        "max_rounds" => builder.max_rounds(scheme, parse_u32(key, value)?),
                        "default_rounds" => builder.default_rounds(scheme, parse_u32(key, value)?),
                        "vary_rounds" => builder.vary_rounds(scheme, parse_vary(value)?),
                        _ => {
                            return Err(Error::InvalidPolicy(format!(
                                "unknown policy key '{}'",
                                key
                            )));
                        }
                    };
                }
            }
        }
        builder.build()
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::InvalidPolicy(format!("'{}' must be an integer, got '{}'", key, value)))
}

fn parse_vary(value: &str) -> Result<f64> {
    let value = value.trim();
    if let Some(percent) = value.strip_suffix('%') {
        let n = percent
            .parse::<f64>()
            .map_err(|_| Error::InvalidPolicy(format!("invalid vary_rounds '{}'", value)))?;
        return Ok(n / 100.0);
    }
    value
        .parse::<f64>()
        .map_err(|_| Error::InvalidPolicy(format!("invalid vary_rounds '{}'", value)))
}

/// [`PolicySpec`] 的构造器
///
/// 所有校验集中在 [`build`](PolicyBuilder::build)：方案列表非空且无
/// 重复、默认方案属于列表且未被弃用、弃用名单与覆盖都只引用列表内
/// 的方案、数值范围自洽。
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    schemes: Vec<String>,
    default_scheme: Option<String>,
    deprecated: Vec<String>,
    overrides: HashMap<String, SchemeOverrides>,
    truncate_error: bool,
}

impl PolicyBuilder {
    /// 设置启用的方案列表（按 identify 优先顺序）
    pub fn schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemes = schemes.into_iter().map(Into::into).collect();
        self
    }

    /// 设置新哈希使用的方案；缺省取列表中第一个未弃用方案
    pub fn default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = Some(scheme.into());
        self
    }

    /// 标记一个方案为弃用：仍可验证，但验证成功后报告需要迁移
    pub fn deprecate(mut self, scheme: impl Into<String>) -> Self {
        self.deprecated.push(scheme.into());
        self
    }

    /// 设置方案的最小 rounds
    pub fn min_rounds(mut self, scheme: &str, rounds: u32) -> Self {
        self.overrides.entry(scheme.to_string()).or_default().min_rounds = Some(rounds);
        self
    }

    /// 设置方案的最大 rounds
    pub fn max_rounds(mut self, scheme: &str, rounds: u32) -> Self {
        self.overrides.entry(scheme.to_string()).or_default().max_rounds = Some(rounds);
        self
    }

    /// 设置方案的默认 rounds
    pub fn default_rounds(mut self, scheme: &str, rounds: u32) -> Self {
        self.overrides.entry(scheme.to_string()).or_default().default_rounds = Some(rounds);
        self
    }

    /// 设置方案的 rounds 抖动比例
    pub fn vary_rounds(mut self, scheme: &str, vary: f64) -> Self {
        self.overrides.entry(scheme.to_string()).or_default().vary_rounds = Some(vary);
        self
    }

    /// 明文超过方案截断长度时报错而不是静默截断
    pub fn truncate_error(mut self, flag: bool) -> Self {
        self.truncate_error = flag;
        self
    }

    /// 校验并产出策略
    pub fn build(self) -> Result<PolicySpec> {
        if self.schemes.is_empty() {
            return Err(Error::invalid_policy("scheme list must not be empty"));
        }
        let mut seen = HashSet::new();
        for scheme in &self.schemes {
            if !seen.insert(scheme.as_str()) {
                return Err(Error::InvalidPolicy(format!(
                    "duplicate scheme '{}'",
                    scheme
                )));
            }
        }
        let deprecated: HashSet<String> = self.deprecated.into_iter().collect();
        for scheme in &deprecated {
            if !seen.contains(scheme.as_str()) {
                return Err(Error::InvalidPolicy(format!(
                    "deprecated scheme '{}' is not in the scheme list",
                    scheme
                )));
            }
        }
        for scheme in self.overrides.keys() {
            if !seen.contains(scheme.as_str()) {
                return Err(Error::InvalidPolicy(format!(
                    "override references unknown scheme '{}'",
                    scheme
                )));
            }
        }
        for (scheme, ov) in &self.overrides {
            if let (Some(min), Some(max)) = (ov.min_rounds, ov.max_rounds)
                && min > max
            {
                return Err(Error::InvalidPolicy(format!(
                    "{}: min_rounds {} exceeds max_rounds {}",
                    scheme, min, max
                )));
            }
            if let Some(vary) = ov.vary_rounds
                && !(0.0..=1.0).contains(&vary)
            {
                return Err(Error::InvalidPolicy(format!(
                    "{}: vary_rounds must be within 0.0..=1.0, got {}",
                    scheme, vary
                )));
            }
        }
        let default_scheme = match self.default_scheme {
            Some(scheme) => {
                if !seen.contains(scheme.as_str()) {
                    return Err(Error::InvalidPolicy(format!(
                        "default scheme '{}' is not in the scheme list",
                        scheme
                    )));
                }
                if deprecated.contains(&scheme) {
                    return Err(Error::InvalidPolicy(format!(
                        "default scheme '{}' is deprecated",
                        scheme
                    )));
                }
                scheme
            }
            None => self
                .schemes
                .iter()
                .find(|s| !deprecated.contains(s.as_str()))
                .cloned()
                .ok_or_else(|| Error::invalid_policy("every scheme is deprecated"))?,
        };
        Ok(PolicySpec {
            schemes: self.schemes,
            default_scheme,
            deprecated,
            overrides: self.overrides,
            truncate_error: self.truncate_error,
        })
    }
}

// ============================================================================
// serde 配置表面
// ============================================================================

/// 可反序列化的策略配置（配置文件形态）
///
/// 数值覆盖以扁平键出现（`pbkdf2_sha256__min_rounds: 10000`），
/// 与 [`PolicySpec::from_options`] 的键空间一致。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// 启用的方案
    pub schemes: Vec<String>,
    /// 默认方案；缺省取第一个未弃用方案
    #[serde(default)]
    pub default: Option<String>,
    /// 弃用名单
    #[serde(default)]
    pub deprecated: Vec<String>,
    /// 截断时报错
    #[serde(default)]
    pub truncate_error: bool,
    /// 扁平的数值覆盖键
    #[serde(flatten)]
    pub options: BTreeMap<String, f64>,
}

impl TryFrom<PolicyConfig> for PolicySpec {
    type Error = Error;

    fn try_from(config: PolicyConfig) -> Result<PolicySpec> {
        let mut builder = PolicyBuilder::default()
            .schemes(config.schemes)
            .truncate_error(config.truncate_error);
        if let Some(default) = config.default {
            builder = builder.default_scheme(default);
        }
        for scheme in config.deprecated {
            builder = builder.deprecate(scheme);
        }
        for (key, value) in config.options {
            let (scheme, option) = key
                .split_once("__")
                .ok_or_else(|| Error::InvalidPolicy(format!("unknown policy key '{}'", key)))?;
            builder = match option {
                "min_rounds" => builder.min_rounds(scheme, float_to_u32(&key, value)?),
                "max_rounds" => builder.max_rounds(scheme, float_to_u32(&key, value)?),
                "default_rounds" => builder.default_rounds(scheme, float_to_u32(&key, value)?),
                "vary_rounds" => builder.vary_rounds(scheme, value),
                _ => {
                    return Err(Error::InvalidPolicy(format!("unknown policy key '{}'", key)));
                }
            };
        }
        builder.build()
    }
}

fn float_to_u32(key: &str, value: f64) -> Result<u32> {
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(Error::InvalidPolicy(format!(
            "'{}' must be a non-negative integer, got {}",
            key, value
        )));
    }
    Ok(value as u32)
}

// ============================================================================
// 上下文
// ============================================================================

/// 一次验证的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// 明文与存储哈希是否匹配
    pub matched: bool,
    /// 认领该哈希的方案；没有任何方案识别时为 `None`
    pub handler_used: Option<&'static str>,
    /// 该哈希是否应当迁移（方案被弃用，或参数低于当前策略）
    pub needs_update: bool,
}

/// 不可变的密码哈希策略引擎
pub struct CryptContext {
    policy: PolicySpec,
    handlers: Vec<&'static dyn Handler>,
    default_ix: usize,
}

impl std::fmt::Debug for CryptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptContext")
            .field("policy", &self.policy)
            .field(
                "handlers",
                &self
                    .handlers
                    .iter()
                    .map(|h| h.descriptor().scheme_id)
                    .collect::<Vec<_>>(),
            )
            .field("default_ix", &self.default_ix)
            .finish()
    }
}

impl CryptContext {
    /// 从策略构造上下文，方案在内建注册表中解析
    ///
    /// # Returns
    ///
    /// 策略引用了未编译进来的方案时返回 `InvalidPolicy`；方案存在
    /// 但内核自检失败时返回 `BackendUnavailable`，绝不静默跳过。
    /// rounds 覆盖越出方案声明范围同样在这里失败，而不是等到
    /// 哈希时被钳制。
    pub fn new(policy: PolicySpec) -> Result<Self> {
        Self::with_handlers(policy, &[])
    }

    /// 同 [`new`](CryptContext::new)，但额外提供外部 Handler
    ///
    /// `extra` 中的方案优先于内建注册表，用于注入自定义方案。
    pub fn with_handlers(
        policy: PolicySpec,
        extra: &[&'static dyn Handler],
    ) -> Result<Self> {
        let mut handlers = Vec::with_capacity(policy.schemes().len());
        for scheme in policy.schemes() {
            let handler = extra
                .iter()
                .copied()
                .find(|h| h.scheme_id() == scheme)
                .map(Ok)
                .or_else(|| registry::get(scheme).map(Ok))
                .unwrap_or_else(|| {
                    if registry::is_known(scheme) {
                        Err(Error::BackendUnavailable(scheme.clone()))
                    } else {
                        Err(Error::InvalidPolicy(format!("unknown scheme '{}'", scheme)))
                    }
                })?;
            check_rounds_overrides(scheme, handler, &policy)?;
            handlers.push(handler);
        }
        let default_ix = policy
            .schemes()
            .iter()
            .position(|s| s == policy.default_scheme())
            .ok_or_else(|| Error::invalid_policy("default scheme missing from scheme list"))?;
        Ok(CryptContext {
            policy,
            handlers,
            default_ix,
        })
    }

    /// 当前策略
    pub fn policy(&self) -> &PolicySpec {
        &self.policy
    }

    /// 判定哈希属于哪个启用方案
    ///
    /// 按策略声明的顺序第一个命中者获胜；没有命中返回
    /// [`Error::UnknownScheme`]。
    pub fn identify(&self, hash: &str) -> Result<&'static str> {
        self.find(hash)
            .map(|h| h.scheme_id())
            .ok_or(Error::UnknownScheme)
    }

    /// 用默认方案为明文生成新哈希
    pub fn hash(&self, secret: &[u8]) -> Result<String> {
        let handler = self.handlers[self.default_ix];
        handler.hash(secret, None, &self.policy.scheme_policy(handler.scheme_id()))
    }

    /// 校验明文与存储哈希
    ///
    /// 没有方案识别该哈希时返回 `matched: false` 而不是错误：损坏
    /// 或陌生格式的存储值与"密码错误"在对外行为上不可区分。
    ///
    /// # Returns
    ///
    /// 只有明文本身非法（超长）才返回 `Err`。
    pub fn verify(&self, secret: &[u8], hash: &str) -> Result<VerifyOutcome> {
        self.verify_inner(secret, hash, None)
    }

    /// 用默认方案为明文生成新哈希，携带调用期用户名
    ///
    /// postgres_md5 这类 user-keyed 方案以用户名作盐；其余方案
    /// 忽略用户名，行为与 [`hash`](CryptContext::hash) 相同。
    pub fn hash_with_user(&self, secret: &[u8], user: &str) -> Result<String> {
        let handler = self.handlers[self.default_ix];
        handler.hash_with_user(secret, user, None, &self.policy.scheme_policy(handler.scheme_id()))
    }

    /// 携带调用期用户名校验明文与存储哈希
    pub fn verify_with_user(&self, secret: &[u8], user: &str, hash: &str) -> Result<VerifyOutcome> {
        self.verify_inner(secret, hash, Some(user))
    }

    /// 校验并在需要时生成替换哈希
    ///
    /// # Returns
    ///
    /// `(outcome, replacement)`；只有验证成功且哈希落后于策略时
    /// `replacement` 才是 `Some`，新哈希使用当前默认方案。
    pub fn verify_and_update(
        &self,
        secret: &[u8],
        hash: &str,
    ) -> Result<(VerifyOutcome, Option<String>)> {
        let outcome = self.verify(secret, hash)?;
        if outcome.matched && outcome.needs_update {
            let replacement = self.hash(secret)?;
            return Ok((outcome, Some(replacement)));
        }
        Ok((outcome, None))
    }

    /// 存储哈希是否落后于当前策略
    pub fn needs_update(&self, hash: &str) -> Result<bool> {
        let handler = self.find(hash).ok_or(Error::UnknownScheme)?;
        Ok(self.hash_needs_update(handler, hash))
    }

    fn find(&self, hash: &str) -> Option<&'static dyn Handler> {
        self.handlers.iter().copied().find(|h| h.identify(hash))
    }

    fn verify_inner(&self, secret: &[u8], hash: &str, user: Option<&str>) -> Result<VerifyOutcome> {
        if secret.len() > MAX_SECRET_SIZE {
            return Err(Error::ValueTooLarge {
                max: MAX_SECRET_SIZE,
                actual: secret.len(),
            });
        }
        let Some(handler) = self.find(hash) else {
            return Ok(VerifyOutcome {
                matched: false,
                handler_used: None,
                needs_update: false,
            });
        };
        let matched = match user {
            Some(user) => handler.verify_with_user(secret, user, hash),
            None => handler.verify(secret, hash),
        };
        Ok(VerifyOutcome {
            matched,
            handler_used: Some(handler.scheme_id()),
            needs_update: self.hash_needs_update(handler, hash),
        })
    }

    fn hash_needs_update(&self, handler: &'static dyn Handler, hash: &str) -> bool {
        self.policy.is_deprecated(handler.scheme_id())
            || handler.needs_update(hash, &self.policy.scheme_policy(handler.scheme_id()))
    }
}

/// 覆盖值必须落在方案声明的范围内
///
/// [`PolicyBuilder`] 看不到 Handler 描述符，只能校验结构一致性；
/// 与方案声明范围的比对推迟到这里。越界的覆盖是配置错误，
/// 不是钳制点：静默钳制会掩盖写错的策略。
fn check_rounds_overrides(
    scheme: &str,
    handler: &'static dyn Handler,
    policy: &PolicySpec,
) -> Result<()> {
    let sp = policy.scheme_policy(scheme);
    let overrides = [
        ("min_rounds", sp.min_rounds),
        ("max_rounds", sp.max_rounds),
        ("default_rounds", sp.default_rounds),
    ];
    match handler.descriptor().rounds {
        Some(spec) => {
            for (name, value) in overrides {
                if let Some(v) = value
                    && !(spec.min..=spec.max).contains(&v)
                {
                    return Err(Error::InvalidPolicy(format!(
                        "{}: {} {} outside the scheme's declared range {}..={}",
                        scheme, name, v, spec.min, spec.max
                    )));
                }
            }
        }
        None => {
            if overrides.iter().any(|(_, v)| v.is_some()) || sp.vary_rounds.is_some() {
                return Err(Error::InvalidPolicy(format!(
                    "{}: scheme has no rounds parameter to override",
                    scheme
                )));
            }
        }
    }
    Ok(())
}
