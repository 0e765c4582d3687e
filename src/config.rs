use crate::error::ConfigError;
use dotenv::dotenv;
use std::env;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 50;
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_REVEAL_INTERVAL_MS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Tabbed,
    Modal,
    Form,
}

impl Layout {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "tabbed" | "tabs" => Ok(Layout::Tabbed),
            "modal" => Ok(Layout::Modal),
            "form" | "two-column" => Ok(Layout::Form),
            other => Err(ConfigError::UnknownLayout(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub layout: Layout,
    pub max_upload_bytes: u64,
    pub page_size: usize,
    pub reveal_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            layout: Layout::Tabbed,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            page_size: DEFAULT_PAGE_SIZE,
            reveal_interval: Duration::from_millis(DEFAULT_REVEAL_INTERVAL_MS),
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup("SHEETSIGHT_BACKEND_URL") {
            config.backend_url = normalize_backend_url(&url)?;
        }
        if let Some(layout) = lookup("SHEETSIGHT_LAYOUT") {
            config.layout = Layout::parse(&layout)?;
        }

        let max_mb = parse_or(lookup("SHEETSIGHT_MAX_UPLOAD_MB"), DEFAULT_MAX_UPLOAD_MB);
        config.max_upload_bytes = max_mb * 1024 * 1024;
        config.page_size = parse_or(lookup("SHEETSIGHT_PAGE_SIZE"), DEFAULT_PAGE_SIZE).max(1);
        config.reveal_interval = Duration::from_millis(parse_or(
            lookup("SHEETSIGHT_REVEAL_INTERVAL_MS"),
            DEFAULT_REVEAL_INTERVAL_MS,
        ));

        Ok(config)
    }

    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / (1024 * 1024)
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    match raw {
        Some(val) => val.trim().parse::<T>().unwrap_or(default),
        None => default,
    }
}

fn normalize_backend_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    reqwest::Url::parse(trimmed).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.backend_url, "http://localhost:8000");
        assert_eq!(config.layout, Layout::Tabbed);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.reveal_interval, Duration::from_millis(30));
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("SHEETSIGHT_BACKEND_URL", "http://10.0.0.5:9000/"),
            ("SHEETSIGHT_LAYOUT", "Modal"),
            ("SHEETSIGHT_MAX_UPLOAD_MB", "5"),
            ("SHEETSIGHT_PAGE_SIZE", "25"),
            ("SHEETSIGHT_REVEAL_INTERVAL_MS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.backend_url, "http://10.0.0.5:9000");
        assert_eq!(config.layout, Layout::Modal);
        assert_eq!(config.max_upload_mb(), 5);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.reveal_interval, Duration::from_millis(10));
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("SHEETSIGHT_PAGE_SIZE", "lots"),
            ("SHEETSIGHT_MAX_UPLOAD_MB", "-3"),
        ]))
        .unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_upload_mb(), DEFAULT_MAX_UPLOAD_MB);
    }

    #[test]
    fn unknown_layout_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("SHEETSIGHT_LAYOUT", "grid")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLayout(ref l) if l == "grid"));
    }

    #[test]
    fn invalid_url_is_an_error() {
        let err =
            Config::from_lookup(lookup_from(&[("SHEETSIGHT_BACKEND_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }
}
