//! CryptContext 集成测试
//!
//! 覆盖核心迁移场景：旧库存验证、弃用方案的透明升级、策略配置的
//! 多种构造表面，以及上下文不可变带来的并发安全语义。

use passrs::handler::{Handler, SchemePolicy};
use passrs::{CryptContext, Error, PolicyConfig, PolicySpec, registry};

fn migration_policy() -> PolicySpec {
    PolicySpec::builder()
        .schemes(["pbkdf2_sha256", "md5_crypt"])
        .default_scheme("pbkdf2_sha256")
        .deprecate("md5_crypt")
        .default_rounds("pbkdf2_sha256", 2000)
        .build()
        .unwrap()
}

#[test]
fn test_legacy_inventory_migration() {
    let ctx = CryptContext::new(migration_policy()).unwrap();

    // 1. 库存里还躺着一条多年前的 md5-crypt 记录
    let legacy = registry::get("md5_crypt")
        .unwrap()
        .hash(b"swordfish", None, &SchemePolicy::default())
        .unwrap();
    assert!(legacy.starts_with("$1$"));

    // 2. 用户登录：验证成功，同时拿到一条新默认方案的替换哈希
    let (outcome, replacement) = ctx.verify_and_update(b"swordfish", &legacy).unwrap();
    assert!(outcome.matched);
    assert_eq!(outcome.handler_used, Some("md5_crypt"));
    assert!(outcome.needs_update);
    let replacement = replacement.unwrap();
    assert!(replacement.starts_with("$pbkdf2-sha256$2000$"));

    // 3. 替换哈希已满足策略，不再触发迁移
    let (outcome, again) = ctx.verify_and_update(b"swordfish", &replacement).unwrap();
    assert!(outcome.matched);
    assert!(!outcome.needs_update);
    assert_eq!(again, None);

    // 4. 密码错误时绝不生成替换哈希
    let (outcome, none) = ctx.verify_and_update(b"tunafish", &legacy).unwrap();
    assert!(!outcome.matched);
    assert_eq!(none, None);
}

#[test]
fn test_garbage_hash_never_raises() {
    let ctx = CryptContext::new(migration_policy()).unwrap();
    for garbage in ["", "$$garbage", "$$$garbage", "$9$unknown$x", "not-a-hash", "$1$"] {
        let outcome = ctx.verify(b"whatever", garbage).unwrap();
        assert!(!outcome.matched, "garbage {:?} must not match", garbage);
    }
    // identify 的契约不同：无法识别是显式错误
    assert_eq!(ctx.identify("$$garbage").unwrap_err(), Error::UnknownScheme);
}

#[test]
fn test_rounds_policy_drives_needs_update() {
    // 1. 以旧策略生成一批哈希
    let relaxed = PolicySpec::builder()
        .schemes(["pbkdf2_sha256"])
        .default_rounds("pbkdf2_sha256", 2000)
        .build()
        .unwrap();
    let ctx = CryptContext::new(relaxed).unwrap();
    let hash = ctx.hash(b"secret").unwrap();
    assert!(!ctx.needs_update(&hash).unwrap());

    // 2. 策略收紧：同一条哈希现在低于最小 rounds
    let strict = PolicySpec::builder()
        .schemes(["pbkdf2_sha256"])
        .min_rounds("pbkdf2_sha256", 10_000)
        .build()
        .unwrap();
    let strict_ctx = CryptContext::new(strict).unwrap();
    assert!(strict_ctx.needs_update(&hash).unwrap());

    // 3. 旧上下文不受影响：策略更新 = 新上下文
    assert!(!ctx.needs_update(&hash).unwrap());
}

#[test]
fn test_scheme_priority_first_match_wins() {
    let ctx = CryptContext::new(migration_policy()).unwrap();
    let pbkdf2 = ctx.hash(b"x").unwrap();
    assert_eq!(ctx.identify(&pbkdf2).unwrap(), "pbkdf2_sha256");
    let legacy = registry::get("md5_crypt")
        .unwrap()
        .hash(b"x", None, &SchemePolicy::default())
        .unwrap();
    assert_eq!(ctx.identify(&legacy).unwrap(), "md5_crypt");
}

#[test]
fn test_user_keyed_scheme_through_context() {
    let policy = PolicySpec::builder()
        .schemes(["pbkdf2_sha256", "postgres_md5"])
        .default_scheme("pbkdf2_sha256")
        .deprecate("postgres_md5")
        .default_rounds("pbkdf2_sha256", 2000)
        .build()
        .unwrap();
    let ctx = CryptContext::new(policy).unwrap();

    // 1. 库存里的 pg_shadow 记录，盐是账户名
    let legacy = "md55fba2ea04fd36069d2574ea71c8efe9d";
    assert_eq!(ctx.identify(legacy).unwrap(), "postgres_md5");

    // 2. 带用户名验证成功，同时报告需要迁移
    let outcome = ctx.verify_with_user(b"mypass", "postgres", legacy).unwrap();
    assert!(outcome.matched);
    assert_eq!(outcome.handler_used, Some("postgres_md5"));
    assert!(outcome.needs_update);

    // 3. 不带用户名或带错用户名都不可能匹配
    assert!(!ctx.verify(b"mypass", legacy).unwrap().matched);
    assert!(!ctx.verify_with_user(b"mypass", "admin", legacy).unwrap().matched);

    // 4. 默认方案不吃用户名，hash_with_user 与 hash 等价
    let replacement = ctx.hash_with_user(b"mypass", "postgres").unwrap();
    assert!(replacement.starts_with("$pbkdf2-sha256$"));
    assert!(ctx.verify(b"mypass", &replacement).unwrap().matched);
}

#[test]
fn test_policy_from_options_surface() {
    let policy = PolicySpec::from_options([
        ("schemes", "pbkdf2_sha256, md5_crypt"),
        ("deprecated", "md5_crypt"),
        ("pbkdf2_sha256__default_rounds", "3000"),
        ("pbkdf2_sha256__vary_rounds", "10%"),
    ])
    .unwrap();
    let ctx = CryptContext::new(policy).unwrap();

    // 抖动开启时 rounds 落在 [2700, 3300]
    for _ in 0..10 {
        let hash = ctx.hash(b"x").unwrap();
        let rounds: u32 = hash
            .strip_prefix("$pbkdf2-sha256$")
            .and_then(|rest| rest.split('$').next())
            .and_then(|s| s.parse().ok())
            .unwrap();
        assert!((2700..=3300).contains(&rounds), "rounds {} out of range", rounds);
    }
}

#[test]
fn test_policy_config_json_round_trip() {
    let json = r#"{
        "schemes": ["pbkdf2_sha256", "md5_crypt"],
        "default": "pbkdf2_sha256",
        "deprecated": ["md5_crypt"],
        "truncate_error": true,
        "pbkdf2_sha256__min_rounds": 5000
    }"#;
    let config: PolicyConfig = serde_json::from_str(json).unwrap();
    let policy = PolicySpec::try_from(config).unwrap();
    assert!(policy.is_deprecated("md5_crypt"));
    assert_eq!(policy.scheme_policy("pbkdf2_sha256").min_rounds, Some(5000));
    assert!(CryptContext::new(policy).is_ok());
}

#[test]
fn test_unknown_scheme_in_policy_is_constructor_error() {
    let policy = PolicySpec::builder()
        .schemes(["pbkdf2_sha256", "rot13"])
        .build()
        .unwrap();
    assert!(matches!(
        CryptContext::new(policy).unwrap_err(),
        Error::InvalidPolicy(_)
    ));
}

#[cfg(feature = "bcrypt")]
#[test]
fn test_bcrypt_truncation_policy() {
    // bcrypt 只吃前 72 字节；truncate_error 策略下超长明文直接报错
    let policy = PolicySpec::builder()
        .schemes(["bcrypt"])
        .default_rounds("bcrypt", 4)
        .truncate_error(true)
        .build()
        .unwrap();
    let ctx = CryptContext::new(policy).unwrap();
    let long = vec![b'a'; 100];
    assert!(matches!(
        ctx.hash(&long).unwrap_err(),
        Error::ValueTooLarge { max: 72, actual: 100 }
    ));

    // 默认策略下静默截断：72 字节之后的差异不影响匹配
    let lax = PolicySpec::builder()
        .schemes(["bcrypt"])
        .default_rounds("bcrypt", 4)
        .build()
        .unwrap();
    let lax_ctx = CryptContext::new(lax).unwrap();
    let hash = lax_ctx.hash(&long).unwrap();
    let mut other = long.clone();
    other[90] = b'b';
    assert!(lax_ctx.verify(&other, &hash).unwrap().matched);
}
