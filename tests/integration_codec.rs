//! 编解码集成测试
//!
//! 针对真实线格式样本验证解析的严格性与序列化的字节级保真：
//! 同一哈希绝不存在第二种合法编码。

use passrs::handler::Handler;
use passrs::registry;

#[test]
fn test_parse_preserves_exact_text() {
    // 各家族一条真实样本，parse -> encode 必须逐字节还原
    let samples = [
        ("pbkdf2_sha256", "$pbkdf2-sha256$29000$abcdefghijkl$X0/4X8TsfTLRTJzIKc1vDbv.e4P1Y0DQxCC8iQ66BdA"),
        ("sha256_crypt", "$5$rounds=10000$saltstring$penc.Wmxwisl3TJlMZyW4wXy9qCJXhhJ5F3mKOxRvZ5"),
        ("sha256_crypt", "$5$saltstring$5B8vYYiY.CVt1RlTTf8KbXBH3hsxY/GNooZaBBGWEc5"),
        ("md5_crypt", "$1$abcdefgh$LIkkrKVnTmknyXrc8Irzx/"),
        ("nthash", "$3$$8846f7eaee8fb117ad06bdd830b7586c"),
        ("mysql41", "*2470C0C06DEE42FD1618BB99005ADCA2EC9D1E19"),
        ("hex_md5", "5f4dcc3b5aa765d61d8327deb882cf99"),
    ];
    for (scheme, text) in samples {
        let handler = registry::get(scheme).unwrap();
        let record = handler.parse(text).unwrap();
        assert_eq!(
            handler.encode(&record).unwrap(),
            text,
            "{} re-encoded differently",
            scheme
        );
    }
}

#[test]
fn test_zero_padded_rounds_rejected() {
    // "0999" 与 "999" 指向同一参数值，接受它就破坏唯一编码
    let pbkdf2 = registry::get("pbkdf2_sha256").unwrap();
    assert!(pbkdf2.parse("$pbkdf2-sha256$0999$abcdefghijkl$chk").is_err());
    let sha256 = registry::get("sha256_crypt").unwrap();
    assert!(sha256.parse("$5$rounds=05000$saltstring$chk").is_err());
}

#[test]
fn test_wrong_scheme_prefix_rejected() {
    let pbkdf2 = registry::get("pbkdf2_sha256").unwrap();
    assert!(pbkdf2.parse("$pbkdf2-sha512$1000$abcdefghijkl$chk").is_err());
    let md5 = registry::get("md5_crypt").unwrap();
    assert!(md5.parse("$5$saltstring$chk").is_err());
}

#[test]
fn test_extra_and_empty_fields_rejected() {
    let pbkdf2 = registry::get("pbkdf2_sha256").unwrap();
    for bad in [
        "$pbkdf2-sha256$",
        "$pbkdf2-sha256$1000",
        "$pbkdf2-sha256$1000$",
        "$pbkdf2-sha256$1000$salt$",
        "$pbkdf2-sha256$1000$salt$chk$extra",
        "$pbkdf2-sha256$$salt$chk",
    ] {
        assert!(pbkdf2.parse(bad).is_err(), "accepted {:?}", bad);
    }
}

#[test]
fn test_legacy_identify_requires_exact_shape() {
    let hex_md5 = registry::get("hex_md5").unwrap();
    // 长度或大小写不符的输入一律不认领
    assert!(!hex_md5.identify("5f4dcc3b5aa765d61d8327deb882cf9"));
    assert!(!hex_md5.identify("5f4dcc3b5aa765d61d8327deb882cf99a"));
    assert!(!hex_md5.identify("5F4DCC3B5AA765D61D8327DEB882CF99"));
    assert!(!hex_md5.identify("zf4dcc3b5aa765d61d8327deb882cf99"));

    let mysql41 = registry::get("mysql41").unwrap();
    assert!(!mysql41.identify("2470C0C06DEE42FD1618BB99005ADCA2EC9D1E19"));
    assert!(!mysql41.identify("*2470c0c06dee42fd1618bb99005adca2ec9d1e19"));
}

#[test]
fn test_genconfig_records_survive_encode_parse() {
    // 带盐方案的配置记录：编码再解析后语义相等（raw 不参与比较）
    use passrs::handler::SchemePolicy;
    let salted = [
        "pbkdf2_sha256",
        "pbkdf2_sha512",
        "sha256_crypt",
        "sha512_crypt",
        "md5_crypt",
        #[cfg(feature = "bcrypt")]
        "bcrypt",
        #[cfg(feature = "scrypt")]
        "scrypt",
        #[cfg(feature = "argon2")]
        "argon2",
    ];
    for scheme in salted {
        let handler = registry::get(scheme).unwrap();
        let policy = SchemePolicy {
            default_rounds: handler.descriptor().rounds.map(|r| r.min),
            ..Default::default()
        };
        let config = handler.genconfig(&policy, None).unwrap();
        let text = handler.encode(&config).unwrap();
        let reparsed = handler.parse(&text).unwrap();
        assert_eq!(config, reparsed, "{} config record drifted", scheme);
    }
}

#[test]
fn test_config_string_round_trip_without_checksum() {
    // genconfig 产物（无校验和）与其编码再解析的结果语义相等
    let sha256 = registry::get("sha256_crypt").unwrap();
    let record = sha256.parse("$5$rounds=5000$saltstring").unwrap();
    assert!(record.checksum.is_empty());
    assert_eq!(
        sha256.encode(&record).unwrap(),
        "$5$rounds=5000$saltstring"
    );
}
