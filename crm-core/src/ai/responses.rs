//! Response Types
//!
//! The JSON contract of the `generate-deal-email` endpoint and the provider
//! result it is built from.

use serde::{Deserialize, Serialize};

/// Email text produced by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedEmail {
    pub email: String,
    /// Model identifier reported by the provider
    pub model: String,
    /// Total tokens billed, 0 when the provider doesn't report usage
    pub tokens_used: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailMetadata {
    pub model: String,
    #[serde(default)]
    pub tokens_used: u64,
}

/// Body of every gateway response, success or failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayBody {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EmailMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayBody {
    pub fn success(generated: GeneratedEmail) -> Self {
        Self {
            success: true,
            email: Some(generated.email),
            metadata: Some(EmailMetadata {
                model: generated.model,
                tokens_used: generated.tokens_used,
            }),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            email: None,
            metadata: None,
            error: Some(message.into()),
        }
    }

    /// Converts a successful body back into the generated email
    pub fn into_generated(self) -> Option<GeneratedEmail> {
        if !self.success {
            return None;
        }
        let email = self.email.filter(|e| !e.trim().is_empty())?;
        let metadata = self.metadata.unwrap_or(EmailMetadata {
            model: String::new(),
            tokens_used: 0,
        });
        Some(GeneratedEmail {
            email,
            model: metadata.model,
            tokens_used: metadata.tokens_used,
        })
    }
}
