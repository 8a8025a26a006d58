//! # passrs
//!
//! 密码哈希框架：统一的方案契约、Modular Crypt Format 编解码与
//! 可配置的验证/迁移策略引擎。
//!
//! ## 功能特性
//!
//! - **Handler 契约**：每个哈希方案（argon2、bcrypt、scrypt、pbkdf2
//!   家族、crypt(3) 家族与若干遗留摘要）实现同一套 identify / parse /
//!   encode / genconfig / hash / verify 操作
//! - **严格编解码**：解析拒绝一切歧义编码（零填充 rounds、空字段、
//!   多余字段），保证 `encode(parse(s)) == s` 字节级成立
//! - **CryptContext**：一组方案 + 弃用名单 + cost 覆盖组成不可变
//!   策略引擎，验证旧哈希的同时报告是否需要迁移
//! - **后端自检**：每个内核先通过已知答案自检才会被选用，降级与
//!   排除都是显式可查询的数据
//!
//! ## 快速开始
//!
//! ```rust
//! use passrs::{CryptContext, PolicySpec};
//!
//! // 迁移场景：新哈希用 pbkdf2，旧的 md5-crypt 库存仍可验证
//! let policy = PolicySpec::builder()
//!     .schemes(["pbkdf2_sha256", "md5_crypt"])
//!     .default_scheme("pbkdf2_sha256")
//!     .deprecate("md5_crypt")
//!     .build()
//!     .unwrap();
//! let ctx = CryptContext::new(policy).unwrap();
//!
//! let stored = ctx.hash(b"correct horse battery staple").unwrap();
//! let outcome = ctx.verify(b"correct horse battery staple", &stored).unwrap();
//! assert!(outcome.matched);
//! ```
//!
//! ## Feature 标志
//!
//! - `argon2` - argon2id / argon2i / argon2d 方案（默认启用）
//! - `bcrypt` - bcrypt 方案（默认启用）
//! - `scrypt` - scrypt 方案（默认启用）
//!
//! pbkdf2 家族、crypt(3) 家族与遗留摘要方案始终编译。

pub mod backend;
pub mod codec;
pub mod context;
pub mod error;
pub mod handler;
pub mod policy;
pub mod registry;

pub use context::{CryptContext, PolicyBuilder, PolicyConfig, PolicySpec, VerifyOutcome};
pub use error::{Error, Result};
pub use handler::{Handler, SchemePolicy};
pub use codec::HashRecord;
