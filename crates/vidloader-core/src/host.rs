//! Script hosts
//!
//! Fetching and evaluating a player script is the one network-facing step
//! of a load. A [`ScriptHost`] performs it and returns the globals the
//! script defined. [`HttpScriptHost`] downloads over HTTP and hands the
//! source to a [`ScriptEvaluator`] supplied by the embedding JavaScript
//! engine.

use crate::runtime::ScriptExports;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("request for {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("script unavailable: {0}")]
    Unavailable(String),
}

/// Loads a player script and reports the globals it installed
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn load_script(&self, src: &str) -> Result<ScriptExports, ScriptError>;
}

/// Runs downloaded script source in a JavaScript context
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, src: &str, source: &str) -> Result<ScriptExports, ScriptError>;
}

#[cfg(feature = "http")]
pub use self::http::{HttpScriptHost, ProbeReport};

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::{Error, Result};
    use reqwest::Client;
    use std::sync::Arc;
    use tracing::{debug, instrument, warn};

    /// Outcome of a reachability probe
    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
    pub struct ProbeReport {
        pub url: String,
        pub status: u16,
        pub content_type: Option<String>,
        pub content_length: Option<u64>,
    }

    impl ProbeReport {
        pub fn is_success(&self) -> bool {
            (200..300).contains(&self.status)
        }
    }

    /// Script host backed by `reqwest`
    pub struct HttpScriptHost {
        client: Client,
        evaluator: Option<Arc<dyn ScriptEvaluator>>,
    }

    impl HttpScriptHost {
        pub fn new(config: &LoaderConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(config.script_timeout())
                .build()
                .map_err(|e| Error::InvalidConfig(format!("HTTP client: {}", e)))?;

            Ok(Self {
                client,
                evaluator: None,
            })
        }

        pub fn with_evaluator(mut self, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
            self.evaluator = Some(evaluator);
            self
        }

        /// Download `src` without evaluating it
        #[instrument(skip(self))]
        pub async fn fetch(&self, src: &str) -> std::result::Result<String, ScriptError> {
            let response = self
                .client
                .get(src)
                .send()
                .await
                .map_err(|e| ScriptError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                warn!(url = src, status = status.as_u16(), "Player script request failed");
                return Err(ScriptError::Status {
                    url: src.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| ScriptError::Network(e.to_string()))?;
            debug!(url = src, bytes = body.len(), "Player script downloaded");
            Ok(body)
        }

        /// Check that `src` is being served, using a HEAD request
        pub async fn probe(&self, src: &str) -> std::result::Result<ProbeReport, ScriptError> {
            let response = self
                .client
                .head(src)
                .send()
                .await
                .map_err(|e| ScriptError::Network(e.to_string()))?;

            let headers = response.headers();
            let content_type = headers
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let content_length = headers
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());

            Ok(ProbeReport {
                url: src.to_string(),
                status: response.status().as_u16(),
                content_type,
                content_length,
            })
        }
    }

    #[async_trait]
    impl ScriptHost for HttpScriptHost {
        async fn load_script(&self, src: &str) -> std::result::Result<ScriptExports, ScriptError> {
            let evaluator = self.evaluator.clone().ok_or_else(|| {
                ScriptError::Evaluation("no script evaluator is configured".into())
            })?;
            let source = self.fetch(src).await?;
            evaluator.evaluate(src, &source)
        }
    }

}
