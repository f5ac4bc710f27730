use crate::error::{AppError, ProviderError};
use crate::models::{ChatMessage, ChatRole};
use crate::providers::{
    error_from_response, resolve_endpoint, unauthorized_or_status, CompletionProvider,
    CompletionRequest, ProviderContext,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter;

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicAdapter {
    // The Messages API rejects a conversation that opens with an assistant turn.
    fn conversation(messages: &[ChatMessage]) -> &[ChatMessage] {
        let skip = messages
            .iter()
            .take_while(|m| m.role == ChatRole::Assistant)
            .count();
        &messages[skip..]
    }

    fn build_body<'a>(request: &'a CompletionRequest<'a>) -> MessagesBody<'a> {
        MessagesBody {
            model: request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: Some(request.system).filter(|s| !s.trim().is_empty()),
            messages: Self::conversation(request.messages),
        }
    }

    fn extract_text(body: &str) -> Result<String, ProviderError> {
        let parsed: MessagesResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::Malformed(format!("invalid response body: {e}")))?;
        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(ProviderError::Malformed(
                "response contained no text".into(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionProvider for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(
        &self,
        client: &Client,
        ctx: &ProviderContext,
        request: &CompletionRequest<'_>,
    ) -> Result<String, ProviderError> {
        let url = resolve_endpoint(ctx.base_url.as_deref(), DEFAULT_BASE, "messages");
        let response = client
            .post(url)
            .header("x-api-key", &ctx.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&Self::build_body(request))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = %status, "anthropic completion response received");
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        Self::extract_text(&body)
    }

    async fn test_connection(
        &self,
        client: &Client,
        ctx: &ProviderContext,
    ) -> Result<Option<u16>, AppError> {
        let url = resolve_endpoint(ctx.base_url.as_deref(), DEFAULT_BASE, "models");

        let response = client
            .get(url)
            .header("x-api-key", &ctx.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(Some(status.as_u16()));
        }
        Err(unauthorized_or_status("Anthropic", status))
    }
}
