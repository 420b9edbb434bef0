//! Runtime configuration from the environment, overridable by CLI flags.

use std::path::PathBuf;

use crate::api::normalize_base_url;

pub const ENV_API_BASE_URL: &str = "CASHBACK_API_BASE_URL";
pub const ENV_QR_BASE_URL: &str = "CASHBACK_QR_BASE_URL";
pub const ENV_DATA_DIR: &str = "CASHBACK_DATA_DIR";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
const APP_DIR_NAME: &str = "cashback-console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub qr_base_url: String,
    pub data_dir: PathBuf,
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Platform data directory, `LOCALAPPDATA` or `XDG_DATA_HOME` first.
fn default_data_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join(APP_DIR_NAME)
}

impl AppConfig {
    /// Environment values with explicit overrides applied on top.
    pub fn resolve(api_url: Option<&str>, qr_base_url: Option<&str>) -> Self {
        let api_base_url = api_url
            .map(str::to_string)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_non_empty(ENV_API_BASE_URL))
            .map(|v| normalize_base_url(&v))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let qr_base_url = qr_base_url
            .map(str::to_string)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_non_empty(ENV_QR_BASE_URL))
            .map(|v| normalize_base_url(&v))
            .unwrap_or_else(|| api_base_url.clone());

        let data_dir = env_non_empty(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Self {
            api_base_url,
            qr_base_url,
            data_dir,
        }
    }

    /// The URL encoded into a printed QR for `hash`.
    pub fn qr_value(&self, hash: &str) -> String {
        format!("{}/api/public/qrs/{hash}", self.qr_base_url)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var(ENV_API_BASE_URL);
        std::env::remove_var(ENV_QR_BASE_URL);
        std::env::remove_var(ENV_DATA_DIR);
    }

    #[test]
    #[serial]
    fn defaults_when_environment_is_empty() {
        clear_env();
        let config = AppConfig::resolve(None, None);
        assert_eq!(config.api_base_url, "http://localhost:5000");
        assert_eq!(config.qr_base_url, "http://localhost:5000");
        assert!(config.data_dir.ends_with("cashback-console"));
        assert_eq!(
            config.qr_value("abc"),
            "http://localhost:5000/api/public/qrs/abc"
        );
    }

    #[test]
    #[serial]
    fn environment_values_are_normalized() {
        clear_env();
        std::env::set_var(ENV_API_BASE_URL, "api.cashback.app/api/");
        std::env::set_var(ENV_QR_BASE_URL, "https://qr.cashback.app/");
        std::env::set_var(ENV_DATA_DIR, "/tmp/cashback-test");

        let config = AppConfig::resolve(None, None);
        assert_eq!(config.api_base_url, "https://api.cashback.app");
        assert_eq!(
            config.qr_value("h1"),
            "https://qr.cashback.app/api/public/qrs/h1"
        );
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/cashback-test/logs"));
        clear_env();
    }

    #[test]
    #[serial]
    fn flags_override_environment() {
        clear_env();
        std::env::set_var(ENV_API_BASE_URL, "https://env.example");
        let config = AppConfig::resolve(Some("localhost:8080"), None);
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.qr_base_url, "http://localhost:8080");
        clear_env();
    }
}
