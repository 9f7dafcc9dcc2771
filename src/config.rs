//! Configuration
//!
//! Environment-driven settings for the forms core. A `.env` file is loaded
//! when present; real environment variables take precedence.

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Default debounce window for auto-save
pub const DEFAULT_AUTO_SAVE_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_FORM_VERSION: &str = "1.0";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3001";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static DEFAULT_BASE_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_API_URL).expect("default API URL parses"));

/// Which Remote Form Store implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-memory fixture data
    Mock,
    /// Real HTTP API (default)
    #[default]
    Http,
}

impl StoreBackend {
    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Mock => "mock",
            StoreBackend::Http => "http",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" | "memory" | "fixture" => Ok(StoreBackend::Mock),
            "http" | "remote" | "real" => Ok(StoreBackend::Http),
            other => Err(ConfigError::UnknownBackend {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Settings shared by form sessions and store construction
#[derive(Debug, Clone)]
pub struct FormsConfig {
    pub backend: StoreBackend,
    pub base_url: Url,
    pub auto_save_enabled: bool,
    pub auto_save_delay: Duration,
    pub form_version: String,
    pub request_timeout: Duration,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            base_url: DEFAULT_BASE_URL.clone(),
            auto_save_enabled: true,
            auto_save_delay: DEFAULT_AUTO_SAVE_DELAY,
            form_version: DEFAULT_FORM_VERSION.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl FormsConfig {
    /// Load from the process environment (and `.env`, if present).
    ///
    /// | variable | meaning |
    /// |---|---|
    /// | `FORMS_STORE_BACKEND` | `mock` or `http` |
    /// | `USE_MOCK_DATA` | truthy forces the mock backend |
    /// | `FORMS_API_URL` | base URL of the form API |
    /// | `FORMS_AUTO_SAVE` | enable auto-save (default true) |
    /// | `FORMS_AUTO_SAVE_DELAY_MS` | debounce window |
    /// | `FORMS_VERSION` | version stamped on submitted payloads |
    /// | `FORMS_HTTP_TIMEOUT_SECS` | HTTP request timeout |
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("FORMS_STORE_BACKEND") {
            config.backend = value.parse()?;
        }
        if let Some(value) = lookup("USE_MOCK_DATA") {
            if parse_flag("USE_MOCK_DATA", &value)? {
                config.backend = StoreBackend::Mock;
            }
        }
        if let Some(value) = lookup("FORMS_API_URL") {
            config.base_url = Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl {
                key: "FORMS_API_URL".to_string(),
                source,
            })?;
        }
        if let Some(value) = lookup("FORMS_AUTO_SAVE") {
            config.auto_save_enabled = parse_flag("FORMS_AUTO_SAVE", &value)?;
        }
        if let Some(value) = lookup("FORMS_AUTO_SAVE_DELAY_MS") {
            config.auto_save_delay =
                Duration::from_millis(parse_number("FORMS_AUTO_SAVE_DELAY_MS", &value)?);
        }
        if let Some(value) = lookup("FORMS_VERSION") {
            if !value.trim().is_empty() {
                config.form_version = value.trim().to_string();
            }
        }
        if let Some(value) = lookup("FORMS_HTTP_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_number("FORMS_HTTP_TIMEOUT_SECS", &value)?);
        }

        Ok(config)
    }

    pub fn with_backend(mut self, backend: StoreBackend) -> Self {
        self.backend = backend;
        self
    }
}

/// Host and port for the mock form store server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl MockServerConfig {
    /// Read `FORMS_MOCK_HOST` / `FORMS_MOCK_PORT`.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Ok(host) = std::env::var("FORMS_MOCK_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("FORMS_MOCK_PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "FORMS_MOCK_PORT".to_string(),
                value: port.clone(),
                expected: "a port number".to_string(),
            })?;
        }
        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "a boolean (true/false/1/0)".to_string(),
        }),
    }
}

fn parse_number(key: &str, value: &str) -> ConfigResult<u64> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: "a non-negative integer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("mock".parse::<StoreBackend>().unwrap(), StoreBackend::Mock);
        assert_eq!("FIXTURE".parse::<StoreBackend>().unwrap(), StoreBackend::Mock);
        assert_eq!("remote".parse::<StoreBackend>().unwrap(), StoreBackend::Http);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = FormsConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.backend, StoreBackend::Http);
        assert!(config.auto_save_enabled);
        assert_eq!(config.auto_save_delay, Duration::from_secs(30));
        assert_eq!(config.form_version, "1.0");
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:3001/");
    }

    #[test]
    fn test_use_mock_data_overrides_backend() {
        let config = FormsConfig::from_lookup(lookup(&[
            ("FORMS_STORE_BACKEND", "http"),
            ("USE_MOCK_DATA", "true"),
        ]))
        .unwrap();
        assert_eq!(config.backend, StoreBackend::Mock);

        let config = FormsConfig::from_lookup(lookup(&[("USE_MOCK_DATA", "0")])).unwrap();
        assert_eq!(config.backend, StoreBackend::Http);
    }

    #[test]
    fn test_overrides() {
        let config = FormsConfig::from_lookup(lookup(&[
            ("FORMS_API_URL", "https://forms.example.org/v2/"),
            ("FORMS_AUTO_SAVE", "off"),
            ("FORMS_AUTO_SAVE_DELAY_MS", "1500"),
            ("FORMS_VERSION", "2.3"),
            ("FORMS_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.base_url.as_str(), "https://forms.example.org/v2/");
        assert!(!config.auto_save_enabled);
        assert_eq!(config.auto_save_delay, Duration::from_millis(1500));
        assert_eq!(config.form_version, "2.3");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        let err = FormsConfig::from_lookup(lookup(&[("FORMS_AUTO_SAVE_DELAY_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("FORMS_AUTO_SAVE_DELAY_MS"));

        let err = FormsConfig::from_lookup(lookup(&[("FORMS_API_URL", "::")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let err = FormsConfig::from_lookup(lookup(&[("USE_MOCK_DATA", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_mock_server_address() {
        assert_eq!(MockServerConfig::default().address(), "127.0.0.1:3001");
    }
}
