//! Deal enrichment
//!
//! An enricher turns a won deal into a congratulatory email. Failures are
//! returned as values; callers decide what to do with them.

use anyhow::{bail, Result};
use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::ai::client::{http_client, ProviderSettings};
use crate::ai::gateway::{EmailGateway, EmailRequest, GatewayError};
use crate::ai::responses::{GatewayBody, GeneratedEmail};
use crate::config::{EnrichmentConfig, EnrichmentMode};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrichmentError {
    #[error("enrichment disabled")]
    Disabled,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("gateway request failed: {0}")]
    Remote(String),

    #[error("enrichment unavailable: {0}")]
    Unavailable(String),
}

/// Result of one enrichment attempt
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Generated(GeneratedEmail),
    Failed(EnrichmentError),
}

impl From<Result<GeneratedEmail, EnrichmentError>> for EnrichmentOutcome {
    fn from(result: Result<GeneratedEmail, EnrichmentError>) -> Self {
        match result {
            Ok(generated) => EnrichmentOutcome::Generated(generated),
            Err(error) => EnrichmentOutcome::Failed(error),
        }
    }
}

pub trait DealEnricher: Send + Sync {
    fn enrich(&self, request: &EmailRequest) -> EnrichmentOutcome;
}

/// Calls the provider from this process
pub struct GatewayEnricher {
    gateway: EmailGateway,
}

impl GatewayEnricher {
    pub fn new(gateway: EmailGateway) -> Self {
        Self { gateway }
    }
}

impl DealEnricher for GatewayEnricher {
    fn enrich(&self, request: &EmailRequest) -> EnrichmentOutcome {
        self.gateway
            .generate(request)
            .map_err(EnrichmentError::from)
            .into()
    }
}

/// POSTs to a deployed gateway
pub struct RemoteEnricher {
    client: Client,
    url: String,
}

impl RemoteEnricher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }

    fn call(&self, request: &EmailRequest) -> Result<GeneratedEmail, EnrichmentError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .map_err(|e| EnrichmentError::Remote(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| EnrichmentError::Remote(e.to_string()))?;
        interpret_gateway_response(status.as_u16(), &text)
    }
}

impl DealEnricher for RemoteEnricher {
    fn enrich(&self, request: &EmailRequest) -> EnrichmentOutcome {
        self.call(request).into()
    }
}

/// Reads a gateway reply. The JSON body is authoritative; the status only
/// fills in when the body carries no message
fn interpret_gateway_response(status: u16, text: &str) -> Result<GeneratedEmail, EnrichmentError> {
    let body: GatewayBody = serde_json::from_str(text).map_err(|_| {
        EnrichmentError::Remote(format!("HTTP {} with a non-JSON body", status))
    })?;

    if body.success {
        return body
            .into_generated()
            .ok_or_else(|| EnrichmentError::Remote("response carried no email".to_string()));
    }

    Err(EnrichmentError::Remote(
        body.error.unwrap_or_else(|| format!("HTTP {}", status)),
    ))
}

/// Always fails; used when enrichment is turned off
pub struct DisabledEnricher;

impl DealEnricher for DisabledEnricher {
    fn enrich(&self, _request: &EmailRequest) -> EnrichmentOutcome {
        EnrichmentOutcome::Failed(EnrichmentError::Disabled)
    }
}

/// Stands in for an enricher that could not be built
pub struct UnavailableEnricher {
    reason: String,
}

impl UnavailableEnricher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl DealEnricher for UnavailableEnricher {
    fn enrich(&self, _request: &EmailRequest) -> EnrichmentOutcome {
        EnrichmentOutcome::Failed(EnrichmentError::Unavailable(self.reason.clone()))
    }
}

/// Like [`build_enricher`], but a configuration that cannot produce an
/// enricher yields one that fails every call with the build error
pub fn enricher_or_unavailable(config: &EnrichmentConfig) -> Arc<dyn DealEnricher> {
    build_enricher(config).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not set up enrichment");
        Arc::new(UnavailableEnricher::new(e.to_string()))
    })
}

/// Builds the enricher selected by configuration
pub fn build_enricher(config: &EnrichmentConfig) -> Result<Arc<dyn DealEnricher>> {
    Ok(match config.mode {
        EnrichmentMode::Disabled => Arc::new(DisabledEnricher),
        EnrichmentMode::Local => {
            let gateway = EmailGateway::new(ProviderSettings::from_config(config))?;
            Arc::new(GatewayEnricher::new(gateway))
        }
        EnrichmentMode::Remote => {
            let Some(url) = config.gateway_url.as_deref() else {
                bail!("Enrichment mode is 'remote' but no gateway_url is configured");
            };
            Arc::new(RemoteEnricher::new(
                url,
                Duration::from_secs(config.timeout_secs),
            )?)
        }
    })
}
