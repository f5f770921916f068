//! AI completion provider clients.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ChoiceError;

/// One completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiRequest {
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiResponse {
    pub content: String,
}

/// Provider contract: failures surface as a single error with a readable message.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn request(&self, request: AiRequest) -> Result<AiResponse>;
}

/// Client for OpenAI-compatible chat-completion endpoints.
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl AiClient for OpenAiClient {
    async fn request(&self, request: AiRequest) -> Result<AiResponse> {
        if request.api_key.trim().is_empty() {
            return Err(ChoiceError::invalid("no API key configured for the AI provider").into());
        }

        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
        };

        tracing::debug!(model = %request.model, endpoint = %self.endpoint, "sending completion request");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ChoiceError::ExternalRequest(format!("request failed: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ChoiceError::ExternalRequest(format!("failed to read response: {err}")))?;

        if !status.is_success() {
            return Err(ChoiceError::ExternalRequest(error_message(status, &text)).into());
        }

        parse_completion(&text).map_err(Into::into)
    }
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => format!("{status}: {}", parsed.error.message),
        Err(_) => format!("{status}: {}", body.trim()),
    }
}

fn parse_completion(body: &str) -> Result<AiResponse, ChoiceError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|err| ChoiceError::ExternalRequest(format!("malformed completion response: {err}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| AiResponse { content })
        .ok_or_else(|| ChoiceError::ExternalRequest("completion response had no content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#;
        assert_eq!(parse_completion(body).unwrap().content, "Hello");
    }

    #[test]
    fn empty_choices_are_an_external_failure() {
        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ChoiceError::ExternalRequest(_)));
    }

    #[test]
    fn error_bodies_keep_provider_message() {
        let message = error_message(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        );
        assert_eq!(message, "401 Unauthorized: Incorrect API key provided");
        assert_eq!(
            error_message(reqwest::StatusCode::BAD_GATEWAY, "upstream down\n"),
            "502 Bad Gateway: upstream down"
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_sending() {
        let client = OpenAiClient::new("http://127.0.0.1:9/never");
        let err = client
            .request(AiRequest {
                api_key: " ".into(),
                model: "m".into(),
                system_prompt: String::new(),
                user_prompt: "hi".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChoiceError>(),
            Some(ChoiceError::InvalidArgument(_))
        ));
    }
}
