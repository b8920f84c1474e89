//! Runtime configuration.
//!
//! Read once at startup from the environment and then passed around by
//! value; nothing downstream consults environment variables on its own.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

/// JSON blob with `{ "elementsToStrip": [...], "debug": bool }`.
pub const CONFIG_ENV: &str = "GREMLLM_CONFIG";
/// Internal origin that replaces the externally visible scheme and host.
pub const INTERNAL_BASE_URL_ENV: &str = "GREMLLM_INTERNAL_BASE_URL";
/// Explicit path to the native library, searched before any other location.
pub const LIBRARY_PATH_ENV: &str = "GREMLLM_LIBRARY_PATH";
/// Upstream fetch timeout in whole seconds.
pub const UPSTREAM_TIMEOUT_ENV: &str = "GREMLLM_UPSTREAM_TIMEOUT_SECS";

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} is not valid JSON: {source}")]
    InvalidJson {
        var: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{var} must be an absolute http(s) URL, got '{value}'")]
    InvalidUrl { var: &'static str, value: String },

    #[error("{var} must be a whole number of seconds, got '{value}'")]
    InvalidTimeout { var: &'static str, value: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigBlob {
    #[serde(default)]
    elements_to_strip: Vec<String>,
    #[serde(default)]
    debug: bool,
}

/// Settings shared by the bridge, the server and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GremllmConfig {
    /// Extra element names to strip, added to the native library's built-in set.
    pub elements_to_strip: Vec<String>,
    /// Verbose logging.
    pub debug: bool,
    /// Origin used instead of the public one when fetching pages for conversion.
    pub internal_base_url: Option<Url>,
    /// Native library location that overrides the search list.
    pub library_path: Option<PathBuf>,
    /// Timeout for fetching the page to convert.
    pub upstream_timeout: Duration,
}

impl Default for GremllmConfig {
    fn default() -> Self {
        Self {
            elements_to_strip: Vec::new(),
            debug: false,
            internal_base_url: None,
            library_path: None,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

impl GremllmConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let blob = match non_empty(CONFIG_ENV) {
            Some(raw) => serde_json::from_str::<ConfigBlob>(&raw).map_err(|source| {
                ConfigError::InvalidJson {
                    var: CONFIG_ENV,
                    source,
                }
            })?,
            None => ConfigBlob::default(),
        };

        let internal_base_url = non_empty(INTERNAL_BASE_URL_ENV)
            .map(|raw| parse_base_url(INTERNAL_BASE_URL_ENV, &raw))
            .transpose()?;

        let upstream_timeout = match non_empty(UPSTREAM_TIMEOUT_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidTimeout {
                    var: UPSTREAM_TIMEOUT_ENV,
                    value: raw,
                })?,
            None => DEFAULT_UPSTREAM_TIMEOUT,
        };

        Ok(Self {
            elements_to_strip: blob.elements_to_strip,
            debug: blob.debug,
            internal_base_url,
            library_path: non_empty(LIBRARY_PATH_ENV).map(PathBuf::from),
            upstream_timeout,
        })
    }
}

/// Parse an internal base URL. Only scheme, host and port are used.
pub fn parse_base_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        var,
        value: raw.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = GremllmConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, GremllmConfig::default());
    }

    #[test]
    fn test_reads_json_blob() {
        let config = GremllmConfig::from_lookup(lookup(&[(
            CONFIG_ENV,
            r#"{"elementsToStrip": ["aside", ".cookie-banner"], "debug": true}"#,
        )]))
        .unwrap();
        assert_eq!(config.elements_to_strip, vec!["aside", ".cookie-banner"]);
        assert!(config.debug);
    }

    #[test]
    fn test_partial_blob_uses_defaults() {
        let config =
            GremllmConfig::from_lookup(lookup(&[(CONFIG_ENV, r#"{"debug": true}"#)])).unwrap();
        assert!(config.elements_to_strip.is_empty());
        assert!(config.debug);
    }

    #[test]
    fn test_malformed_blob() {
        let err = GremllmConfig::from_lookup(lookup(&[(CONFIG_ENV, "{debug:")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));
    }

    #[test]
    fn test_internal_base_url() {
        let config = GremllmConfig::from_lookup(lookup(&[
            (INTERNAL_BASE_URL_ENV, "http://127.0.0.1:8080"),
            (LIBRARY_PATH_ENV, "/opt/gremllm/libgremllm.so"),
            (UPSTREAM_TIMEOUT_ENV, "5"),
        ]))
        .unwrap();
        let base = config.internal_base_url.unwrap();
        assert_eq!(base.host_str(), Some("127.0.0.1"));
        assert_eq!(base.port(), Some(8080));
        assert_eq!(
            config.library_path,
            Some(PathBuf::from("/opt/gremllm/libgremllm.so"))
        );
        assert_eq!(config.upstream_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = GremllmConfig::from_lookup(lookup(&[(INTERNAL_BASE_URL_ENV, "ftp://internal")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let err = GremllmConfig::from_lookup(lookup(&[(INTERNAL_BASE_URL_ENV, "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = GremllmConfig::from_lookup(lookup(&[(UPSTREAM_TIMEOUT_ENV, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));
    }
}
