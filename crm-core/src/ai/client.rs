//! Provider Client Module
//!
//! One trait for every hosted text-generation API, plus the shared blocking
//! HTTP plumbing the implementations use.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::ai::gemini::GeminiProvider;
use crate::ai::openai::OpenAiProvider;
use crate::ai::responses::GeneratedEmail;
use crate::config::{EnrichmentConfig, ProviderKind};

/// Sampling temperature sent to every provider
pub const TEMPERATURE: f64 = 0.7;
/// Completion length cap sent to every provider
pub const MAX_OUTPUT_TOKENS: u32 = 500;

/// Errors that can occur while calling a provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0}")]
    Request(String),

    #[error("{status} {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

/// A hosted API that turns a prompt into email text
pub trait EmailProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether a credential is available for this provider
    fn has_credentials(&self) -> bool;

    /// Single best-effort call. An empty `email` means the provider returned
    /// no content
    fn generate(&self, system: &str, prompt: &str) -> Result<GeneratedEmail, ProviderError>;
}

/// Everything needed to build a provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ProviderSettings {
    /// Settings from configuration, with the credential read from the environment
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self {
            kind: config.provider,
            api_key: config.provider.api_key(),
            model: config.model().to_string(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Builds the provider selected by `settings.kind`
pub fn build_provider(settings: ProviderSettings) -> Result<Arc<dyn EmailProvider>> {
    Ok(match settings.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(settings)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(settings)?),
    })
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pulls `error.message` out of an error body, falling back to the raw text
fn error_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return Some(parsed.error.message);
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(200).collect())
    }
}

/// Sends `body` as JSON and decodes a successful response
pub(crate) fn send_json<B, R>(request: RequestBuilder, body: &B) -> Result<R, ProviderError>
where
    B: Serialize,
    R: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .map_err(|e| ProviderError::Request(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .map_err(|e| ProviderError::Request(e.to_string()))?;

    if !status.is_success() {
        let message = error_message(&text)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_api_detail() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("Incorrect API key provided")
        );
        assert_eq!(error_message("  upstream down ").as_deref(), Some("upstream down"));
        assert_eq!(error_message(""), None);
    }

    #[test]
    fn test_status_error_display() {
        let err = ProviderError::Status {
            status: 401,
            message: "Incorrect API key provided".into(),
        };
        assert_eq!(err.to_string(), "401 Incorrect API key provided");
    }

    #[test]
    fn test_settings_from_config() {
        let config = EnrichmentConfig {
            provider: ProviderKind::Gemini,
            base_url: Some("http://localhost:9999/".into()),
            timeout_secs: 5,
            ..Default::default()
        };
        let settings = ProviderSettings::from_config(&config);
        assert_eq!(settings.model, "gemini-1.5-flash");
        assert_eq!(settings.base_url, "http://localhost:9999");
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }
}
