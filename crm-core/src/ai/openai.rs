//! OpenAI chat-completions provider

use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::ai::client::{
    http_client, send_json, EmailProvider, ProviderError, ProviderSettings, MAX_OUTPUT_TOKENS,
    TEMPERATURE,
};
use crate::ai::responses::GeneratedEmail;
use crate::config::ProviderKind;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatReply>,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

impl ChatResponse {
    fn into_generated(self, requested_model: &str) -> GeneratedEmail {
        let email = self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        GeneratedEmail {
            email,
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            tokens_used: self.usage.map_or(0, |u| u.total_tokens),
        }
    }
}

pub struct OpenAiProvider {
    client: Client,
    settings: ProviderSettings,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.settings.base_url)
    }
}

impl EmailProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn has_credentials(&self) -> bool {
        self.settings.api_key.is_some()
    }

    fn generate(&self, system: &str, prompt: &str) -> Result<GeneratedEmail, ProviderError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Request("API key not configured".to_string()))?;

        let request = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        tracing::debug!(model = %self.settings.model, "requesting chat completion");
        let response: ChatResponse =
            send_json(self.client.post(self.endpoint()).bearer_auth(api_key), &request)?;
        Ok(response.into_generated(&self.settings.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let body = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4-0613",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Dear Jane,\n\nCongratulations!"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200}
        }"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        let generated = response.into_generated("gpt-4");

        assert_eq!(generated.email, "Dear Jane,\n\nCongratulations!");
        assert_eq!(generated.model, "gpt-4-0613");
        assert_eq!(generated.tokens_used, 200);
    }

    #[test]
    fn test_parse_completion_without_choices_or_usage() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let generated = response.into_generated("gpt-4");

        assert!(generated.email.is_empty());
        assert_eq!(generated.model, "gpt-4");
        assert_eq!(generated.tokens_used, 0);
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest {
            model: "gpt-4",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["max_tokens"], 500);
    }

    #[test]
    fn test_missing_key_never_hits_network() {
        let provider = OpenAiProvider::new(ProviderSettings {
            kind: ProviderKind::OpenAi,
            api_key: None,
            model: "gpt-4".into(),
            base_url: "http://127.0.0.1:9".into(),
            timeout: std::time::Duration::from_secs(1),
        })
        .unwrap();
        assert!(!provider.has_credentials());
        assert!(matches!(
            provider.generate("sys", "hi"),
            Err(ProviderError::Request(_))
        ));
    }
}
