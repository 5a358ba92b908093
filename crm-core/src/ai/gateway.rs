//! Deal email gateway
//!
//! Validates a `{dealName, dealValue, contactName}` request, asks the
//! configured provider for a congratulatory email and maps every failure to
//! an HTTP status and a JSON error body. The HTTP server and the in-process
//! enricher share this code.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::ai::client::{build_provider, EmailProvider, ProviderSettings};
use crate::ai::prompts::{build_email_prompt, SYSTEM_PROMPT};
use crate::ai::responses::{GatewayBody, GeneratedEmail};
use crate::config::ProviderKind;

/// Longest numeric prefix accepted for a string `dealValue`
static LEADING_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid float regex")
});

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Method not allowed. Use POST.")]
    MethodNotAllowed,

    #[error("Invalid JSON in request body")]
    InvalidJson,

    #[error("Missing required fields: dealName, dealValue, and contactName are required")]
    MissingFields,

    #[error("dealName and contactName must be strings")]
    InvalidFieldTypes,

    #[error("dealValue must be a positive number")]
    InvalidDealValue,

    #[error(
        "{} API key not configured. Please add {} to your secrets.",
        .provider.display_name(),
        .provider.api_key_env()
    )]
    MissingApiKey { provider: ProviderKind },

    #[error("{} API error: {message}", .provider.display_name())]
    Upstream {
        provider: ProviderKind,
        message: String,
    },

    #[error("Failed to generate email content from {}", .provider.display_name())]
    EmptyContent { provider: ProviderKind },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl GatewayError {
    /// HTTP status code for this error
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::MethodNotAllowed => 405,
            GatewayError::InvalidJson => 400,
            GatewayError::MissingFields
            | GatewayError::InvalidFieldTypes
            | GatewayError::InvalidDealValue => 422,
            GatewayError::Upstream { .. } => 502,
            GatewayError::MissingApiKey { .. }
            | GatewayError::EmptyContent { .. }
            | GatewayError::Unexpected(_) => 500,
        }
    }
}

/// A validated email request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub deal_name: String,
    pub deal_value: f64,
    pub contact_name: String,
}

/// Status code plus JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: GatewayBody,
}

impl From<GatewayError> for GatewayResponse {
    fn from(error: GatewayError) -> Self {
        Self {
            status: error.status(),
            body: GatewayBody::failure(error.to_string()),
        }
    }
}

/// Truthiness of a JSON field: absent, null, false, 0 and "" are all missing
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Parses the longest leading decimal literal, ignoring leading whitespace
/// and any trailing text: `"12.5abc"` is 12.5
pub fn parse_leading_float(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let literal = LEADING_FLOAT.find(trimmed)?.as_str();
    literal.parse().ok()
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_leading_float(s),
        _ => None,
    }
}

/// Validates a raw request body in the contract's order: JSON, presence,
/// string types, then a finite positive value
pub fn parse_request(body: &str) -> Result<EmailRequest, GatewayError> {
    let value: Value = serde_json::from_str(body).map_err(|_| GatewayError::InvalidJson)?;

    let fields = ["dealName", "dealValue", "contactName"];
    if !fields.iter().all(|name| is_present(value.get(name))) {
        return Err(GatewayError::MissingFields);
    }

    let (Some(Value::String(deal_name)), Some(Value::String(contact_name))) =
        (value.get("dealName"), value.get("contactName"))
    else {
        return Err(GatewayError::InvalidFieldTypes);
    };

    // "Infinity" is not a usable deal value, so non-finite values are rejected
    // along with zero and negatives
    let deal_value = value
        .get("dealValue")
        .and_then(numeric_value)
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or(GatewayError::InvalidDealValue)?;

    Ok(EmailRequest {
        deal_name: deal_name.clone(),
        deal_value,
        contact_name: contact_name.clone(),
    })
}

/// Stateless front door to the configured provider
#[derive(Clone)]
pub struct EmailGateway {
    provider: Arc<dyn EmailProvider>,
}

impl EmailGateway {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        Ok(Self::with_provider(build_provider(settings)?))
    }

    pub fn with_provider(provider: Arc<dyn EmailProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Handles one HTTP request
    pub fn handle(&self, method: &str, body: &str) -> GatewayResponse {
        if !method.eq_ignore_ascii_case("POST") {
            return GatewayError::MethodNotAllowed.into();
        }

        let result = parse_request(body).and_then(|request| self.generate(&request));
        match result {
            Ok(generated) => GatewayResponse {
                status: 200,
                body: GatewayBody::success(generated),
            },
            Err(error) => {
                tracing::debug!(status = error.status(), %error, "email request rejected");
                error.into()
            }
        }
    }

    /// Generates an email for an already validated request
    pub fn generate(&self, request: &EmailRequest) -> Result<GeneratedEmail, GatewayError> {
        let provider = self.provider.kind();
        if !self.provider.has_credentials() {
            return Err(GatewayError::MissingApiKey { provider });
        }

        let prompt = build_email_prompt(
            &request.deal_name,
            request.deal_value,
            &request.contact_name,
        );

        let generated = self
            .provider
            .generate(SYSTEM_PROMPT, &prompt)
            .map_err(|e| GatewayError::Upstream {
                provider,
                message: e.to_string(),
            })?;

        if generated.email.trim().is_empty() {
            return Err(GatewayError::EmptyContent { provider });
        }

        tracing::info!(
            provider = %provider,
            model = %generated.model,
            tokens = generated.tokens_used,
            "generated deal email"
        );
        Ok(generated)
    }
}
