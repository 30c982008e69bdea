use roost_config::RoostConfigLoader;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
version: "0.1"
database:
  url: "sqlite://sessions.db?mode=rwc"
browser:
  webdriver_url: "http://127.0.0.1:4444"
  headless: true
  launch_attempts: 2
batch:
  login_url: "https://login.yahoo.com/"
  proxy: "user:pass@10.1.2.3:8080"
gate:
  demo_mode: false
  "#;
    let p = write_yaml(&tmp, "roost.yaml", file_yaml);

    let config = RoostConfigLoader::new()
        .with_file(p)
        .load()
        .expect("load system config");

    assert_eq!(config.database.url, "sqlite://sessions.db?mode=rwc");
    assert_eq!(config.browser.webdriver_url, "http://127.0.0.1:4444");
    assert!(config.browser.headless);
    assert_eq!(config.browser.launch_attempts, 2);
    assert_eq!(config.batch.login_url, "https://login.yahoo.com/");
    assert!(!config.gate.demo_mode);
    // Untouched sections keep their defaults.
    assert_eq!(config.batch.mailbox_url, "https://mail.google.com/");
}

#[test]
fn test_missing_file_is_tolerated() {
    let config = RoostConfigLoader::new()
        .with_file("definitely/not/here/roost.yaml")
        .load()
        .expect("defaults apply");
    assert_eq!(config.browser.profiles_dir, "browser_profiles");
}
