// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_CONFIG_PATH: &str = "DASHBOARD_CONFIG_PATH";
const ENV_DATA_DIR: &str = "DASHBOARD_DATA_DIR";
const ENV_BIND_ADDR: &str = "DASHBOARD_BIND_ADDR";
const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub accounts_file: PathBuf,
    pub request_timeout_secs: u64,
    pub api_base: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            data_dir: PathBuf::from("data"),
            accounts_file: PathBuf::from("users.txt"),
            request_timeout_secs: 10,
            api_base: "https://api.github.com".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration:
    /// 1) $DASHBOARD_CONFIG_PATH, 2) ./dashboard.toml, 3) built-in defaults;
    /// then apply the DASHBOARD_DATA_DIR / DASHBOARD_BIND_ADDR overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            Self::from_file(Path::new(&p))?
        } else {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                Self::from_file(default_path)?
            } else {
                Self::default()
            }
        };

        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var(ENV_BIND_ADDR) {
            cfg.bind_addr = addr;
        }
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.request_timeout_secs, 10);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: AppConfig =
            toml::from_str(r#"accounts_file = "friends.txt""#).unwrap();
        assert_eq!(cfg.accounts_file, PathBuf::from("friends.txt"));
        assert_eq!(cfg.api_base, "https://api.github.com");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<AppConfig>(r#"bind_adr = "oops""#).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_win() {
        std::env::remove_var(ENV_CONFIG_PATH);
        std::env::set_var(ENV_DATA_DIR, "/tmp/dash-data");
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/dash-data"));
        std::env::remove_var(ENV_DATA_DIR);
    }
}
