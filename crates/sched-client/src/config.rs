//! Layered settings shared by the console and the command line client.
//!
//! Precedence is flag > environment > config file > built-in default. Flags and
//! environment are both resolved by clap into [`Overrides`]; this module folds
//! them over the TOML file.

use crate::error::{ClientError, ConfigError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://0.0.0.0:8889";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REFRESH_SECS: u64 = 60;

/// Connection parameters for [`crate::HttpSchedulerClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: Url,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub retries: u32,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            user: None,
            password: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: 0,
        })
    }

    pub fn with_basic_auth(mut self, user: Option<String>, password: Option<String>) -> Self {
        self.user = non_blank(user);
        self.password = non_blank(password);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Credentials, only when both halves are present.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim()).map_err(|err| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "expected an http(s) url".to_string(),
        });
    }
    Ok(url)
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub refresh_secs: Option<u64>,
    pub page_size: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub debug: Option<bool>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads an explicitly requested file (which must exist) or the default
    /// location when present.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::Missing {
                    path: path.to_path_buf(),
                });
            }
            return Self::from_path(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sched-console").join("config.toml"))
}

/// Values coming from flags or environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub refresh_secs: Option<u64>,
    pub page_size: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    pub retries: u32,
    pub refresh_secs: u64,
    pub page_size: u64,
    pub log_dir: Option<PathBuf>,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(Overrides::default(), FileConfig::default())
    }
}

impl Settings {
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Self {
        Self {
            base_url: overrides
                .base_url
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            user: non_blank(overrides.user.or(file.user)),
            password: non_blank(overrides.password.or(file.password)),
            timeout_secs: overrides
                .timeout_secs
                .or(file.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS)
                .max(1),
            retries: overrides.retries.or(file.retries).unwrap_or(0),
            refresh_secs: overrides
                .refresh_secs
                .or(file.refresh_secs)
                .unwrap_or(DEFAULT_REFRESH_SECS)
                .max(1),
            page_size: overrides
                .page_size
                .or(file.page_size)
                .unwrap_or(sched_core::DEFAULT_PAGE_LIMIT)
                .max(1),
            log_dir: overrides.log_dir.or(file.log_dir),
            debug: overrides.debug || file.debug.unwrap_or(false),
        }
    }

    pub fn load(overrides: Overrides, config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = FileConfig::discover(config_path)?;
        Ok(Self::resolve(overrides, file))
    }

    pub fn client_config(&self) -> Result<ClientConfig, ClientError> {
        Ok(ClientConfig::new(&self.base_url)?
            .with_basic_auth(self.user.clone(), self.password.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retries(self.retries))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_backend_conventions() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, "http://0.0.0.0:8889");
        assert_eq!(settings.timeout_secs, 10);
        assert_eq!(settings.retries, 0);
        assert_eq!(settings.refresh_secs, 60);
        assert_eq!(settings.page_size, 100);
        assert!(!settings.debug);
    }

    #[test]
    fn overrides_win_over_file() {
        let file = FileConfig {
            base_url: Some("http://file:1".into()),
            refresh_secs: Some(30),
            user: Some("ops".into()),
            ..FileConfig::default()
        };
        let overrides = Overrides {
            base_url: Some("http://flag:2".into()),
            ..Overrides::default()
        };
        let settings = Settings::resolve(overrides, file);
        assert_eq!(settings.base_url, "http://flag:2");
        assert_eq!(settings.refresh_secs, 30);
        assert_eq!(settings.user.as_deref(), Some("ops"));
    }

    #[test]
    fn basic_auth_requires_both_halves() {
        let half = ClientConfig::new(DEFAULT_BASE_URL)
            .expect("url")
            .with_basic_auth(Some("ops".into()), Some("".into()));
        assert!(half.basic_auth().is_none());

        let full = half.with_basic_auth(Some("ops".into()), Some("secret".into()));
        assert_eq!(full.basic_auth(), Some(("ops", "secret")));
    }

    #[test]
    fn rejects_non_http_base_url() {
        assert!(matches!(
            ClientConfig::new("ftp://example.org"),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            ClientConfig::new("not a url"),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "base_url = \"http://10.0.0.5:8889\"\nretries = 3\npage_size = 25\ndebug = true"
        )
        .expect("write");

        let settings =
            Settings::load(Overrides::default(), Some(file.path())).expect("settings");
        assert_eq!(settings.base_url, "http://10.0.0.5:8889");
        assert_eq!(settings.retries, 3);
        assert_eq!(settings.page_size, 25);
        assert!(settings.debug);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            FileConfig::discover(Some(&missing)),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "retries = \"many\"").expect("write");
        assert!(matches!(
            FileConfig::from_path(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
