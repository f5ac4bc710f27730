use crate::error::{AppError, ProviderError};
use crate::models::ChatMessage;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;

pub mod anthropic;
pub mod openai;

#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub api_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub messages: &'a [ChatMessage],
    pub max_tokens: u32,
    pub temperature: f64,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(
        &self,
        client: &Client,
        ctx: &ProviderContext,
        request: &CompletionRequest<'_>,
    ) -> Result<String, ProviderError>;

    async fn test_connection(
        &self,
        client: &Client,
        ctx: &ProviderContext,
    ) -> Result<Option<u16>, AppError>;
}

pub fn provider_for(name: &str) -> Result<Box<dyn CompletionProvider>, AppError> {
    match name {
        "anthropic" => Ok(Box::new(anthropic::AnthropicAdapter)),
        "openai" => Ok(Box::new(openai::OpenAiAdapter)),
        other => Err(AppError::Config(format!("Unsupported provider '{other}'."))),
    }
}

fn resolve_endpoint(base_url: Option<&str>, default_base: &str, path: &str) -> String {
    let base = base_url.unwrap_or(default_base).trim_end_matches('/');
    let base = base.strip_suffix("/v1").unwrap_or(base);
    format!("{base}/v1/{path}")
}

async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status();
    if status.as_u16() == 429 {
        return ProviderError::RateLimited;
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            }
        });

    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

fn unauthorized_or_status(provider: &str, status: reqwest::StatusCode) -> AppError {
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return AppError::Config(format!(
            "{provider} rejected credentials (unauthorized)."
        ));
    }
    AppError::Config(format!(
        "{provider} connection failed with HTTP status {status}."
    ))
}
