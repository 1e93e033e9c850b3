//! Tests for configuration parsing

use plansync_core::config::CONFIG_FILENAME;
use plansync_core::PlansyncConfig;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = PlansyncConfig::default();
    assert!(config.backend.url.is_empty());
    assert_eq!(config.backend.subscriptions_table, "subscriptions");
    assert_eq!(config.backend.checkout_function, "create-checkout");
    assert_eq!(config.backend.timeout_secs, 10);
}

#[test]
fn test_serialize_config() {
    let config = PlansyncConfig::default();
    let toml_str = toml::to_string(&config).unwrap();
    assert!(toml_str.contains("subscriptions_table"));
    assert!(!toml_str.contains("anon_key"));
}

#[test]
fn test_parse_partial_backend_section() {
    let toml_str = r#"
[backend]
url = "https://xyz.supabase.co"
anon_key = "public-anon"
timeout_secs = 3
"#;

    let config: PlansyncConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.backend.url, "https://xyz.supabase.co");
    assert_eq!(config.backend.anon_key.as_deref(), Some("public-anon"));
    assert_eq!(config.backend.timeout_secs, 3);
    assert_eq!(config.backend.subscriptions_table, "subscriptions");
}

#[test]
fn test_find_and_load_walks_up() {
    let root = TempDir::new().unwrap();
    let nested = root.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();

    let mut config = PlansyncConfig::default();
    config.backend.url = "https://from-file.example".to_string();
    config.backend.checkout_function = "checkout-v2".to_string();
    config.save(&root.path().join(CONFIG_FILENAME)).unwrap();

    let loaded = PlansyncConfig::find_and_load(&nested).unwrap();
    assert_eq!(loaded.backend.checkout_function, "checkout-v2");
}

#[test]
fn test_invalid_file_is_an_error() {
    let root = TempDir::new().unwrap();
    let path = root.path().join(CONFIG_FILENAME);
    std::fs::write(&path, "[backend\nurl = ").unwrap();

    assert!(PlansyncConfig::from_file(&path).is_err());
}

#[test]
fn test_env_overrides() {
    let mut config = PlansyncConfig::default();
    config.backend.url = "https://file.example".to_string();

    config.apply_env(|name| match name {
        "PLANSYNC_URL" => Some("https://env.example".to_string()),
        "PLANSYNC_ANON_KEY" => Some(String::new()),
        _ => None,
    });

    assert_eq!(config.backend.url, "https://env.example");
    assert!(config.backend.anon_key.is_none());
}
