//! 进程级方案注册表
//!
//! 内建方案按固定优先顺序排列：带 `$id$` 前缀的现代方案在前，
//! 靠长度加字符类判定的遗留方案在最后，identify 按此顺序第一个
//! 命中者获胜。首次访问时做一次自检过滤，内核自检失败的方案
//! 整个进程内不可见（fail-closed），之后只读共享。

use std::sync::OnceLock;

use crate::backend::BackendInfo;
use crate::handler::Handler;
#[cfg(feature = "argon2")]
use crate::handler::argon2::ARGON2;
#[cfg(feature = "bcrypt")]
use crate::handler::bcrypt::BCRYPT_HANDLER;
use crate::handler::digests::{HEX_MD5, MYSQL41};
use crate::handler::md5_crypt::MD5_CRYPT;
use crate::handler::nthash::NTHASH;
use crate::handler::pbkdf2::{PBKDF2_SHA256, PBKDF2_SHA512};
use crate::handler::postgres::POSTGRES_MD5;
#[cfg(feature = "scrypt")]
use crate::handler::scrypt::SCRYPT_HANDLER;
use crate::handler::sha_crypt::{SHA256_CRYPT, SHA512_CRYPT};
use crate::handler::windows::{MSDCC, MSDCC2};

/// 全部内建方案，按 identify 优先顺序
static BUILTIN: &[&dyn Handler] = &[
    #[cfg(feature = "argon2")]
    &ARGON2,
    #[cfg(feature = "bcrypt")]
    &BCRYPT_HANDLER,
    #[cfg(feature = "scrypt")]
    &SCRYPT_HANDLER,
    &PBKDF2_SHA256,
    &PBKDF2_SHA512,
    &SHA512_CRYPT,
    &SHA256_CRYPT,
    &MD5_CRYPT,
    &NTHASH,
    &POSTGRES_MD5,
    &MYSQL41,
    // 裸 32 位十六进制的表面由下面三个方案共享，文本无法区分；
    // 上下文只按自己启用的方案顺序认领，注册表顺序仅影响全表扫描
    &MSDCC,
    &MSDCC2,
    &HEX_MD5,
];

static ACTIVE: OnceLock<Vec<&'static dyn Handler>> = OnceLock::new();

fn active() -> &'static [&'static dyn Handler] {
    ACTIVE.get_or_init(|| BUILTIN.iter().copied().filter(|h| h.available()).collect())
}

/// 自检通过的方案列表，按优先顺序
pub fn handlers() -> &'static [&'static dyn Handler] {
    active()
}

/// 按方案标识查找
pub fn get(scheme_id: &str) -> Option<&'static dyn Handler> {
    active().iter().copied().find(|h| h.scheme_id() == scheme_id)
}

/// 方案标识是否在编译进来的内建集合里（不管自检是否通过）
pub fn is_known(scheme_id: &str) -> bool {
    BUILTIN.iter().any(|h| h.scheme_id() == scheme_id)
}

/// 每个内建方案的后端选择结果，用于启动诊断
pub fn backend_report() -> Vec<(&'static str, BackendInfo)> {
    BUILTIN
        .iter()
        .map(|h| (h.scheme_id(), h.backend_info()))
        .collect()
}
