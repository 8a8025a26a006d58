//! Rounds 策略模块
//!
//! 把方案描述符声明的 `[min, max]` cost 范围与策略覆盖合成为
//! genconfig 实际使用的值：默认值越界被静默钳制，显式请求越界
//! 返回 [`Error::RoundsOutOfRange`]，绝不让调用方误判实际强度。
//!
//! "vary rounds" 支持：配置了抖动比例 `v` 时，生成值在
//! `[d*(1-v), d*(1+v)]` 内均匀抽取后再次钳制，把验证延迟摊开到
//! 整个用户群，降低计时指纹。对 log2 标度的方案（bcrypt、scrypt），
//! 抖动在线性标度上进行再换算回来。

use rand::Rng;

use crate::error::{Error, Result};
use crate::handler::{CostScale, RoundsSpec, SchemePolicy};

/// 单个方案的有效 rounds 策略
#[derive(Debug, Clone)]
pub struct RoundsPolicy {
    scheme: &'static str,
    spec: RoundsSpec,
    min: u32,
    max: u32,
    default: u32,
    vary: Option<f64>,
}

impl RoundsPolicy {
    /// 合成描述符范围与策略覆盖
    ///
    /// 策略给出的界会被钳入描述符声明的界，策略默认值再钳入两者交集，
    /// 保证 `genconfig` 的产物永远落在有效范围内。
    pub fn new(scheme: &'static str, spec: &RoundsSpec, policy: &SchemePolicy) -> Self {
        let min = policy
            .min_rounds
            .map_or(spec.min, |m| m.clamp(spec.min, spec.max));
        let max = policy
            .max_rounds
            .map_or(spec.max, |m| m.clamp(spec.min, spec.max));
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let default = policy.default_rounds.unwrap_or(spec.default).clamp(min, max);
        RoundsPolicy {
            scheme,
            spec: *spec,
            min,
            max,
            default,
            vary: policy.vary_rounds,
        }
    }

    /// 有效最小值
    pub fn min(&self) -> u32 {
        self.min
    }

    /// 有效最大值
    pub fn max(&self) -> u32 {
        self.max
    }

    /// 解析一次 cost 请求
    ///
    /// # Arguments
    ///
    /// * `explicit` - 显式请求值；越界返回 `RoundsOutOfRange`。
    ///   `None` 走默认值（含抖动），只钳制不报错。
    pub fn resolve(&self, explicit: Option<u32>) -> Result<u32> {
        match explicit {
            Some(rounds) => {
                if rounds < self.min || rounds > self.max {
                    return Err(Error::RoundsOutOfRange {
                        scheme: self.scheme.to_string(),
                        rounds,
                        min: self.min,
                        max: self.max,
                    });
                }
                Ok(rounds)
            }
            None => Ok(self.generate()),
        }
    }

    /// 默认值，应用抖动后钳制
    fn generate(&self) -> u32 {
        let Some(vary) = self.vary else {
            return self.default;
        };
        if vary <= 0.0 {
            return self.default;
        }
        let (lower, upper) = self.vary_range(vary);
        if lower >= upper {
            return lower;
        }
        let mut rng = rand::rng();
        rng.random_range(lower..=upper)
    }

    /// 抖动区间，log2 标度先换算到线性标度再取对数界
    fn vary_range(&self, vary: f64) -> (u32, u32) {
        match self.spec.scale {
            CostScale::Linear => {
                let d = f64::from(self.default);
                let delta = d * vary;
                let lower = (d - delta).max(0.0) as u32;
                let upper = (d + delta) as u32;
                (lower.clamp(self.min, self.max), upper.clamp(self.min, self.max))
            }
            CostScale::Log2 => {
                // 线性值上 +/- vary，再分别取 ceil/floor 对数还原：
                // 下界取最大下界，上界取最小上界
                let linear = 2f64.powi(self.default as i32);
                let delta = linear * vary;
                let lower = log2_ceil(linear - delta);
                let upper = log2_floor(linear + delta);
                (lower.clamp(self.min, self.max), upper.clamp(self.min, self.max))
            }
        }
    }
}

fn log2_floor(value: f64) -> u32 {
    if value <= 1.0 { 0 } else { value.log2().floor() as u32 }
}

fn log2_ceil(value: f64) -> u32 {
    if value <= 1.0 { 0 } else { value.log2().ceil() as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAR: RoundsSpec = RoundsSpec {
        min: 1000,
        max: 999_999_999,
        default: 29_000,
        scale: CostScale::Linear,
    };

    const LOG2: RoundsSpec = RoundsSpec {
        min: 4,
        max: 31,
        default: 12,
        scale: CostScale::Log2,
    };

    #[test]
    fn test_default_clamped_into_policy_bounds() {
        let policy = SchemePolicy {
            min_rounds: Some(50_000),
            ..Default::default()
        };
        let rp = RoundsPolicy::new("demo", &LINEAR, &policy);
        assert_eq!(rp.resolve(None).unwrap(), 50_000);
    }

    #[test]
    fn test_explicit_out_of_range_fails() {
        let rp = RoundsPolicy::new("demo", &LOG2, &SchemePolicy::default());
        let err = rp.resolve(Some(32)).unwrap_err();
        assert!(matches!(err, Error::RoundsOutOfRange { rounds: 32, .. }));
        assert!(rp.resolve(Some(3)).is_err());
        assert_eq!(rp.resolve(Some(12)).unwrap(), 12);
    }

    #[test]
    fn test_explicit_checked_against_policy_bounds() {
        let policy = SchemePolicy {
            max_rounds: Some(10),
            ..Default::default()
        };
        let rp = RoundsPolicy::new("demo", &LOG2, &policy);
        assert!(rp.resolve(Some(11)).is_err());
        assert_eq!(rp.resolve(Some(10)).unwrap(), 10);
    }

    #[test]
    fn test_vary_rounds_linear_bounds() {
        let policy = SchemePolicy {
            vary_rounds: Some(0.1),
            ..Default::default()
        };
        let rp = RoundsPolicy::new("demo", &LINEAR, &policy);
        for _ in 0..100 {
            let r = rp.resolve(None).unwrap();
            assert!((26_100..=31_900).contains(&r), "rounds {} out of jitter range", r);
        }
    }

    #[test]
    fn test_vary_rounds_log2_stays_in_descriptor_range() {
        let policy = SchemePolicy {
            vary_rounds: Some(0.5),
            default_rounds: Some(5),
            ..Default::default()
        };
        let rp = RoundsPolicy::new("demo", &LOG2, &policy);
        for _ in 0..100 {
            let r = rp.resolve(None).unwrap();
            assert!((4..=31).contains(&r));
        }
    }

    #[test]
    fn test_zero_vary_is_deterministic() {
        let policy = SchemePolicy {
            vary_rounds: Some(0.0),
            ..Default::default()
        };
        let rp = RoundsPolicy::new("demo", &LINEAR, &policy);
        assert_eq!(rp.resolve(None).unwrap(), 29_000);
    }
}
