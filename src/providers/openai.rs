use crate::error::{AppError, ProviderError};
use crate::providers::{
    error_from_response, resolve_endpoint, unauthorized_or_status, CompletionProvider,
    CompletionRequest, ProviderContext,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

const DEFAULT_BASE: &str = "https://api.openai.com";

pub struct OpenAiAdapter;

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<WireMessage<'a>>,
}

impl OpenAiAdapter {
    fn build_body<'a>(request: &'a CompletionRequest<'a>) -> ChatCompletionBody<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.trim().is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: request.system,
            });
        }
        messages.extend(request.messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        ChatCompletionBody {
            model: request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages,
        }
    }

    fn extract_text(body: &str) -> Result<String, ProviderError> {
        let parsed: Value = serde_json::from_str(body)
            .map_err(|e| ProviderError::Malformed(format!("invalid response body: {e}")))?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| ProviderError::Malformed("response contained no text".into()))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(
        &self,
        client: &Client,
        ctx: &ProviderContext,
        request: &CompletionRequest<'_>,
    ) -> Result<String, ProviderError> {
        let url = resolve_endpoint(ctx.base_url.as_deref(), DEFAULT_BASE, "chat/completions");
        let response = client
            .post(url)
            .bearer_auth(&ctx.api_key)
            .json(&Self::build_body(request))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = %status, "openai completion response received");
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
        let response = client.get(url).bearer_auth(&ctx.api_key).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(Some(status.as_u16()));
        }
        Err(unauthorized_or_status("OpenAI", status))
    }
}
