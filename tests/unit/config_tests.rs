use std::collections::HashMap;
use std::path::PathBuf;

use nomina::NominaError;
use nomina::config::Config;
use nomina::test_utils::{TestCase, run_table_tests};

fn overridden(vars: &[(&str, &str)]) -> nomina::Result<Config> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let mut config = Config::default();
    config.apply_overrides(&|key| vars.get(key).cloned())?;
    config.validate()?;
    Ok(config)
}

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.source.paths, [PathBuf::from("nomina.csv")]);
    assert_eq!(config.loader.min_fields, 11);
    assert_eq!(config.loader.streaming_threshold_bytes, 10 * 1024 * 1024);
    assert_eq!(config.loader.batch_size, 50);
    assert!(config.cache.enabled);
    assert_eq!(config.cache.capacity, 50);
    assert_eq!(config.store.path, PathBuf::from("payroll.sqlite"));
    assert!(!config.remote.is_configured());
    config.validate().unwrap();
}

#[test]
fn test_toml_patch_keeps_unset_fields() {
    let config = Config::from_toml_str(
        r#"
        [source]
        paths = ["data/quincena.csv", "nomina.csv"]

        [cache]
        capacity = 10

        [remote]
        url = "https://example.test"
        api_key = "anon"
        "#,
    )
    .unwrap();

    assert_eq!(config.source.paths.len(), 2);
    assert_eq!(config.cache.capacity, 10);
    assert!(config.cache.enabled);
    assert_eq!(config.loader.chunk_size, 8 * 1024);
    assert_eq!(config.remote.table, "payroll_records");
    assert!(config.remote.is_configured());

    let root = PathBuf::from("/srv/nomina");
    assert_eq!(
        config.source.resolve(&root)[0],
        PathBuf::from("/srv/nomina/data/quincena.csv")
    );
    assert_eq!(
        config.store.resolve_path(&root),
        PathBuf::from("/srv/nomina/payroll.sqlite")
    );
}

#[test]
fn test_api_key_is_never_serialized() {
    let mut config = Config::default();
    config.remote.api_key = Some("secret-key".to_string());
    let rendered = serde_json::to_string(&config).unwrap();
    assert!(!rendered.contains("secret-key"));
}

#[test]
fn test_invalid_toml_is_a_config_error() {
    let err = Config::from_toml_str("[cache\ncapacity = 3").unwrap_err();
    assert!(matches!(err, NominaError::Config(_)));
}

#[test]
fn test_validation_table() {
    let cases = vec![
        TestCase {
            name: "defaults",
            input: "",
            expected: true,
        },
        TestCase {
            name: "zero cache capacity",
            input: "[cache]\ncapacity = 0",
            expected: false,
        },
        TestCase {
            name: "zero loader batch",
            input: "[loader]\nbatch_size = 0",
            expected: false,
        },
        TestCase {
            name: "zero store browse limit",
            input: "[store]\nbrowse_limit = 0",
            expected: false,
        },
        TestCase {
            name: "blank remote table",
            input: "[remote]\ntable = \"  \"",
            expected: false,
        },
        TestCase {
            name: "disabled cache still needs no capacity change",
            input: "[cache]\nenabled = false",
            expected: true,
        },
    ];

    run_table_tests(cases, |input| Config::from_toml_str(input).is_ok()).unwrap();
}

#[test]
fn test_env_overrides() {
    let config = overridden(&[
        ("NOMINA_SOURCE_PATHS", "a.csv, ,b.csv"),
        ("NOMINA_LOADER_CHUNK_SIZE", " 4096 "),
        ("NOMINA_CACHE_DISABLED", "yes"),
        ("NOMINA_STORE_PATH", "/tmp/other.sqlite"),
        ("NOMINA_REMOTE_URL", "https://example.test"),
        ("NOMINA_REMOTE_API_KEY", "anon"),
        ("NOMINA_REMOTE_TABLE", "recibos"),
    ])
    .unwrap();

    assert_eq!(
        config.source.paths,
        [PathBuf::from("a.csv"), PathBuf::from("b.csv")]
    );
    assert_eq!(config.loader.chunk_size, 4096);
    assert!(!config.cache.enabled);
    assert_eq!(config.store.path, PathBuf::from("/tmp/other.sqlite"));
    assert_eq!(config.remote.table, "recibos");
    assert!(config.remote.is_configured());
}

#[test]
fn test_cache_enabled_wins_over_disabled() {
    let config = overridden(&[
        ("NOMINA_CACHE_DISABLED", "1"),
        ("NOMINA_CACHE_ENABLED", "true"),
    ])
    .unwrap();
    assert!(config.cache.enabled);
}

#[test]
fn test_env_override_errors() {
    let cases = vec![
        TestCase {
            name: "non-numeric capacity",
            input: ("NOMINA_CACHE_CAPACITY", "lots"),
            expected: true,
        },
        TestCase {
            name: "negative threshold",
            input: ("NOMINA_LOADER_STREAMING_THRESHOLD_BYTES", "-1"),
            expected: true,
        },
        TestCase {
            name: "zero store batch fails validation",
            input: ("NOMINA_STORE_BATCH_SIZE", "0"),
            expected: true,
        },
        TestCase {
            name: "valid search limit",
            input: ("NOMINA_STORE_SEARCH_LIMIT", "25"),
            expected: false,
        },
    ];

    run_table_tests(cases, |(key, value)| {
        matches!(overridden(&[(key, value)]), Err(NominaError::Config(_)))
    })
    .unwrap();
}

#[test]
fn test_explicit_missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(Some(&dir.path().join("absent.toml")), dir.path()).unwrap_err();
    assert!(matches!(err, NominaError::MissingConfig(_)));
}

#[test]
fn test_explicit_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[store]\nsearch_limit = 7\n").unwrap();

    let config = Config::load(Some(&path), dir.path()).unwrap();
    assert_eq!(config.store.search_limit, 7);
}
