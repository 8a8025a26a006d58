//! 内核后端选择模块
//!
//! 一个方案可能有多个内核实现（加速库、vendored 回退实现）。选择在
//! 首次使用时发生一次：按固定的优先顺序逐个探测候选，对每个候选跑
//! 已知输入→已知输出的自检向量，第一个通过的被缓存为进程生命周期内
//! 的内核引用。自检失败的候选被跳过并记录降级，绝不静默返回错误摘要；
//! 全部失败时该方案的 Handler 在启动时被排除出注册表（fail closed）。
//!
//! 缓存写入由 `OnceLock` 保证恰好一次，并发首次使用不会重复探测。

pub mod md5crypt;
pub mod pbkdf2;
pub mod shacrypt;

use std::sync::OnceLock;

/// 一个候选内核：名称 + 函数指针
///
/// 候选按优先级从高到低排列，最快/最受审计的在前。
#[derive(Clone, Copy, Debug)]
pub struct Candidate<F> {
    /// 诊断用名称（如 "rustcrypto/pbkdf2"、"vendored/hmac-loop"）
    pub name: &'static str,
    /// 内核函数指针
    pub kernel: F,
}

impl<F> Candidate<F> {
    /// 创建一个候选
    pub const fn new(name: &'static str, kernel: F) -> Self {
        Candidate { name, kernel }
    }
}

/// 选择结果
#[derive(Clone, Copy, Debug)]
pub struct Selected<F> {
    /// 选中内核的名称
    pub name: &'static str,
    /// 选中的内核
    pub kernel: F,
    /// 被跳过的更高优先级候选数；非零表示发生了降级
    pub fallbacks_skipped: usize,
}

/// 后端诊断信息
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendInfo {
    /// 选中后端的名称
    pub name: &'static str,
    /// 降级跳过数
    pub fallbacks_skipped: usize,
}

impl BackendInfo {
    /// 单一内置实现、无选择过程的方案用此占位
    pub const fn builtin() -> Self {
        BackendInfo {
            name: "builtin",
            fallbacks_skipped: 0,
        }
    }
}

/// 每方案一个的后端缓存单元
///
/// `OnceLock` 提供恰好一次的初始化语义；`None` 表示所有候选自检失败。
pub struct BackendCell<F> {
    cell: OnceLock<Option<Selected<F>>>,
}

impl<F: Copy> BackendCell<F> {
    /// 创建空单元
    pub const fn new() -> Self {
        BackendCell {
            cell: OnceLock::new(),
        }
    }

    /// 取已缓存的选择结果，未缓存时按序探测候选
    ///
    /// # Arguments
    ///
    /// * `candidates` - 按优先级排列的候选表
    /// * `passes` - 自检谓词：对候选内核跑已知向量，返回是否通过
    pub fn get_or_select(
        &self,
        candidates: &[Candidate<F>],
        passes: fn(&F) -> bool,
    ) -> Option<&Selected<F>> {
        self.cell
            .get_or_init(|| {
                for (skipped, candidate) in candidates.iter().enumerate() {
                    if passes(&candidate.kernel) {
                        return Some(Selected {
                            name: candidate.name,
                            kernel: candidate.kernel,
                            fallbacks_skipped: skipped,
                        });
                    }
                }
                None
            })
            .as_ref()
    }
}

impl<F: Copy> Default for BackendCell<F> {
    fn default() -> Self {
        BackendCell::new()
    }
}
