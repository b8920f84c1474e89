//! State shared by the handoff stages.

use std::sync::Arc;

use gremllm_core::{Converter, GremllmConfig};

use crate::detect::DEFAULT_SCHEME;

/// Shared state for both handoff stages.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Bridge to the native library.
    pub converter: Arc<Converter>,
    /// Configuration read once at startup.
    pub config: Arc<GremllmConfig>,
    /// Client used by stage 2 to fetch the page being converted.
    pub client: reqwest::Client,
    /// Scheme assumed by stage 1 when no `X-Forwarded-Proto` is present.
    pub default_scheme: String,
}

impl AppState {
    /// Build state whose upstream client honours `config.upstream_timeout`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed (e.g. no TLS backend).
    pub fn new(converter: Converter, config: GremllmConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()?;
        Ok(Self {
            converter: Arc::new(converter),
            config: Arc::new(config),
            client,
            default_scheme: DEFAULT_SCHEME.to_string(),
        })
    }

    /// Override the scheme stage 1 assumes for plain requests.
    #[must_use]
    pub fn with_default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }
}
