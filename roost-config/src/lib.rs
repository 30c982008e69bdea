//! Loader for workspace configuration with YAML + environment overlays.
//!
//! `roost.yaml` holds the database location, browser launch settings, batch
//! defaults, and the operator credential gate. `ROOST`-prefixed environment
//! variables override file values (`ROOST_DATABASE__URL=…`), and `${VAR}`
//! placeholders inside string values are expanded recursively.
use config::{Config, ConfigError, Environment, File};
use roost_common::StealthLevel;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Top-level configuration for a Roost deployment.
#[derive(Debug, Default, Deserialize)]
pub struct RoostConfig {
    pub version: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection string, e.g. `sqlite://roost.db?mode=rwc`.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BrowserConfig {
    /// Endpoint of a running chromedriver.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub stealth: StealthLevel,
    /// Directory holding per-profile Chrome user-data dirs.
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: String,
    /// Launch tries per profile before it is skipped.
    #[serde(default = "default_launch_attempts")]
    pub launch_attempts: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: false,
            stealth: StealthLevel::default(),
            profiles_dir: default_profiles_dir(),
            launch_attempts: default_launch_attempts(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchConfig {
    /// Where a fresh profile is sent for manual login.
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Origin visited before cookie injection (cookies need a matching page).
    #[serde(default = "default_resume_origin")]
    pub resume_origin: String,
    /// Destination after cookies are restored.
    #[serde(default = "default_mailbox_url")]
    pub mailbox_url: String,
    /// Optional proxy applied to every profile, `host:port` or
    /// `user:pass@host:port`. Per-row roster proxies win unless this is set.
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            resume_origin: default_resume_origin(),
            mailbox_url: default_mailbox_url(),
            proxy: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GateConfig {
    /// Verification endpoint; expected to answer the literal body `1`.
    #[serde(default = "default_gate_endpoint")]
    pub endpoint: String,
    /// When set, any non-empty credential pair is accepted without a
    /// network round-trip.
    #[serde(default = "default_true")]
    pub demo_mode: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            endpoint: default_gate_endpoint(),
            demo_mode: true,
        }
    }
}

fn default_database_url() -> String {
    "sqlite://roost.db?mode=rwc".into()
}
fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}
fn default_profiles_dir() -> String {
    "browser_profiles".into()
}
fn default_launch_attempts() -> u32 {
    3
}
fn default_login_url() -> String {
    "https://accounts.google.com/signup".into()
}
fn default_resume_origin() -> String {
    "https://accounts.google.com/".into()
}
fn default_mailbox_url() -> String {
    "https://mail.google.com/".into()
}
fn default_gate_endpoint() -> String {
    "https://inboxinnovations.org".into()
}
fn default_true() -> bool {
    true
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct RoostConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for RoostConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RoostConfigLoader {
    /// Start with sensible defaults: YAML file + `ROOST_` env overrides.
    ///
    /// ```
    /// use roost_config::RoostConfigLoader;
    ///
    /// let config = RoostConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.browser.launch_attempts, 3);
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("ROOST").separator("__"));
        Self { builder }
    }

    /// Attach a config file; the `config` crate infers format by suffix.
    /// Missing files are tolerated so a bare environment still boots.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use roost_config::RoostConfigLoader;
    ///
    /// let cfg = RoostConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// browser:
    ///   headless: true
    ///   stealth: maximum
    /// batch:
    ///   proxy: "user:pass@10.0.0.1:8080"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(cfg.browser.headless);
    /// assert_eq!(cfg.batch.proxy.as_deref(), Some("user:pass@10.0.0.1:8080"));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// The loader combines YAML with `ROOST_`-prefixed environment variables
    /// and expands `${VAR}` placeholders before materialising typed structs.
    pub fn load(self) -> Result<RoostConfig, ConfigError> {
        let cfg = self.builder.build()?;

        // Round-trip through serde_json so ${VAR} expansion sees every string.
        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: RoostConfig =
            serde_json::from_value(v).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = RoostConfigLoader::new().with_yaml_str("{}").load().unwrap();
        assert_eq!(cfg.database.url, "sqlite://roost.db?mode=rwc");
        assert_eq!(cfg.browser.webdriver_url, "http://localhost:9515");
        assert!(cfg.gate.demo_mode);
        assert!(cfg.batch.proxy.is_none());
    }

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("ROOST_TEST_DB", Some("/data/roost.db"), || {
            let mut v = json!("sqlite://${ROOST_TEST_DB}");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("sqlite:///data/roost.db"));
        });
    }

    #[test]
    fn expands_in_nested_objects() {
        temp_env::with_vars(
            [("PROXY_HOST", Some("10.0.0.9")), ("PROXY_PORT", Some("8080"))],
            || {
                let mut v = json!({
                    "batch": { "proxy": "${PROXY_HOST}:${PROXY_PORT}" },
                    "untouched": 42
                });
                expand_env_in_value(&mut v);
                assert_eq!(
                    v,
                    json!({ "batch": { "proxy": "10.0.0.9:8080" }, "untouched": 42 })
                );
            },
        );
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("INNER", Some("profiles")),
                ("OUTER", Some("/srv/${INNER}")),
            ],
            || {
                let mut v = json!("${OUTER}/chrome");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("/srv/profiles/chrome"));
            },
        );
    }

    #[test]
    fn stops_on_cycles_and_leaves_value_reasonable() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            // With the depth cap, the cycle terminates rather than looping.
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }

    #[test]
    fn stealth_level_parses_lowercase() {
        let cfg = RoostConfigLoader::new()
            .with_yaml_str("browser:\n  stealth: maximum")
            .load()
            .unwrap();
        assert_eq!(cfg.browser.stealth, roost_common::StealthLevel::Maximum);
    }
}
