//! HTTP front end for the email gateway
//!
//! Every method on `/generate-deal-email` reaches the gateway so that
//! non-POST requests get the JSON 405 body rather than axum's empty one.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

use crm_core::ai::GatewayBody;
use crm_core::{EmailGateway, GatewayError, GatewayResponse};

pub const EMAIL_PATH: &str = "/generate-deal-email";

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<EmailGateway>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(EMAIL_PATH, any(generate_deal_email))
        .route("/health", get(health))
        .with_state(state)
}

async fn generate_deal_email(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Response {
    let body = String::from_utf8_lossy(&body).into_owned();
    let gateway = state.gateway.clone();

    // Provider calls use a blocking HTTP client
    let response = tokio::task::spawn_blocking(move || gateway.handle(method.as_str(), &body))
        .await
        .unwrap_or_else(|e| GatewayError::Unexpected(e.to_string()).into());

    into_http(response)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "provider": state.gateway.provider_kind().to_string(),
    }))
}

fn into_http(response: GatewayResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json::<GatewayBody>(response.body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use crm_core::ai::{EmailProvider, ProviderError};
    use crm_core::{GeneratedEmail, ProviderKind};
    use tower::ServiceExt;

    struct FixedProvider {
        credentials: bool,
        result: Result<GeneratedEmail, ProviderError>,
    }

    impl EmailProvider for FixedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Gemini
        }

        fn has_credentials(&self) -> bool {
            self.credentials
        }

        fn generate(&self, _system: &str, prompt: &str) -> Result<GeneratedEmail, ProviderError> {
            assert!(prompt.contains("Acme Renewal"));
            self.result.clone()
        }
    }

    fn app_with(provider: FixedProvider) -> Router {
        router(AppState {
            gateway: Arc::new(EmailGateway::with_provider(Arc::new(provider))),
        })
    }

    fn replying(email: &str) -> Router {
        app_with(FixedProvider {
            credentials: true,
            result: Ok(GeneratedEmail {
                email: email.to_string(),
                model: "gemini-1.5-flash-002".to_string(),
                tokens_used: 128,
            }),
        })
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(EMAIL_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const VALID: &str =
        r#"{"dealName":"Acme Renewal","dealValue":15000,"contactName":"Jane Smith"}"#;

    #[tokio::test]
    async fn test_generates_email() {
        let response = replying("Dear Jane,\nThank you.").oneshot(post(VALID)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let body = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["email"], "Dear Jane,\nThank you.");
        assert_eq!(body["metadata"]["model"], "gemini-1.5-flash-002");
        assert_eq!(body["metadata"]["tokensUsed"], 128);
    }

    #[tokio::test]
    async fn test_get_is_rejected_with_json_body() {
        let request = Request::builder()
            .method("GET")
            .uri(EMAIL_PATH)
            .body(Body::empty())
            .unwrap();
        let response = replying("unused").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let body = read_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Method not allowed. Use POST.");
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let response = replying("unused").oneshot(post("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await["error"],
            "Invalid JSON in request body"
        );

        let response = replying("unused")
            .oneshot(post(r#"{"dealName":"Acme Renewal","dealValue":15000}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = replying("unused")
            .oneshot(post(
                r#"{"dealName":"Acme Renewal","dealValue":"-5","contactName":"Jane"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            read_json(response).await["error"],
            "dealValue must be a positive number"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let app = app_with(FixedProvider {
            credentials: false,
            result: Err(ProviderError::Request("unreachable".to_string())),
        });
        let response = app.oneshot(post(VALID)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await["error"],
            "Gemini API key not configured. Please add GEMINI_API_KEY to your secrets."
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let app = app_with(FixedProvider {
            credentials: true,
            result: Err(ProviderError::Status {
                status: 429,
                message: "quota exceeded".to_string(),
            }),
        });
        let response = app.oneshot(post(VALID)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            read_json(response).await["error"],
            "Gemini API error: 429 quota exceeded"
        );
    }

    #[tokio::test]
    async fn test_health_reports_provider() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = replying("unused").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "gemini");
    }
}
