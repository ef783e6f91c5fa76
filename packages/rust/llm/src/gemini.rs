//! Gemini `generateContent` provider over plain HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use dialoguegen_shared::{DialogueGenError, Result};

use crate::provider::{GenerationModel, ProviderError};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("DialogueGen/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Calls `POST {base_url}models/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl GeminiProvider {
    /// `base_url` should end with a slash, e.g. `https://…/v1beta/`.
    pub fn new(api_key: impl Into<String>, base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DialogueGenError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, model_id: &str) -> std::result::Result<Url, ProviderError> {
        self.base_url
            .join(&format!("models/{model_id}:generateContent"))
            .map_err(|e| ProviderError::InvalidRequest(format!("bad model id '{model_id}': {e}")))
    }
}

#[async_trait]
impl GenerationModel for GeminiProvider {
    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
    ) -> std::result::Result<String, ProviderError> {
        let url = self.endpoint(model_id)?;
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("undecodable body: {e}")))?;

        extract_text(parsed)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateResponse) -> std::result::Result<String, ProviderError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let feedback = response
            .prompt_feedback
            .map(|f| f.to_string())
            .unwrap_or_else(|| "none".into());
        return Err(ProviderError::InvalidResponse(format!(
            "no candidates returned (prompt feedback: {feedback})"
        )));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(ProviderError::InvalidResponse(format!(
            "candidate has no text (finish reason: {reason})"
        )));
    }

    debug!(chars = text.len(), "decoded generation response");
    Ok(text)
}

/// Map a non-success HTTP response to a provider fault.
///
/// The upstream `error.status` string wins over the HTTP code when present.
fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let (upstream_status, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.status, env.error.message),
        Err(_) => (String::new(), body.chars().take(500).collect()),
    };

    match upstream_status.as_str() {
        "UNAVAILABLE" => return ProviderError::Unavailable(message),
        "RESOURCE_EXHAUSTED" => return ProviderError::ResourceExhausted(message),
        "INTERNAL" => return ProviderError::Internal(message),
        _ => {}
    }

    match status {
        StatusCode::SERVICE_UNAVAILABLE => ProviderError::Unavailable(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::TooManyRequests(message),
        StatusCode::INTERNAL_SERVER_ERROR => ProviderError::Internal(message),
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn classify_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() || e.is_connect() {
        ProviderError::Unavailable(e.to_string())
    } else {
        ProviderError::InvalidRequest(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    async fn provider_for(server: &MockServer) -> GeminiProvider {
        let base = Url::parse(&format!("{}/v1beta/", server.uri())).unwrap();
        GeminiProvider::new("test-key", base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [{"text": "hello"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"parts": [{"text": "```json\n[]"}, {"text": "\n```"}], "role": "model"},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let text = provider.generate("gemini-2.0-flash", "hello").await.unwrap();
        assert_eq!(text, "```json\n[]\n```");
    }

    #[tokio::test]
    async fn unavailable_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .await
            .generate("gemini-2.0-flash", "hi")
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Unavailable("The model is overloaded.".into()));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn quota_exhaustion_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .await
            .generate("gemini-2.0-flash", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ResourceExhausted(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn bad_request_is_not_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .await
            .generate("gemini-2.0-flash", "hi")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::Api {
                status: 400,
                message: "API key not valid".into()
            }
        );
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn plain_500_without_envelope_is_internal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .await
            .generate("gemini-2.0-flash", "hi")
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Internal("upstream exploded".into()));
    }

    #[tokio::test]
    async fn blocked_prompt_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .await
            .generate("gemini-2.0-flash", "hi")
            .await
            .unwrap_err();
        match err {
            ProviderError::InvalidResponse(msg) => assert!(msg.contains("SAFETY")),
            other => panic!("expected InvalidResponse, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_joins_model_path() {
        let base = Url::parse("https://generativelanguage.googleapis.com/v1beta/").unwrap();
        let provider = GeminiProvider::new("k", base, Duration::from_secs(1)).unwrap();
        assert_eq!(
            provider.endpoint("gemini-1.5-pro").unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }
}
