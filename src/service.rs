use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::ChatMessage;
use crate::providers::{provider_for, CompletionProvider, CompletionRequest, ProviderContext};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;

pub struct ConnectionReport {
    pub status_code: Option<u16>,
    pub duration_ms: u128,
}

#[async_trait]
pub trait ReplyFetcher: Send + Sync {
    async fn fetch_reply(&self, history: &[ChatMessage], input: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub context_window: usize,
}

impl CompletionSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            model: cfg.provider.model.clone(),
            system_prompt: cfg.chat.system_prompt.clone(),
            max_tokens: cfg.chat.max_tokens,
            temperature: cfg.chat.temperature,
            context_window: cfg.chat.context_window,
        }
    }
}

pub struct ChatService {
    client: Client,
    provider: Box<dyn CompletionProvider>,
    ctx: ProviderContext,
    settings: CompletionSettings,
}

impl ChatService {
    pub fn new(
        provider: Box<dyn CompletionProvider>,
        ctx: ProviderContext,
        settings: CompletionSettings,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            provider,
            ctx,
            settings,
        })
    }

    pub fn from_config(cfg: &AppConfig, api_key: String) -> Result<Self, AppError> {
        let provider = provider_for(&cfg.provider.name)?;
        let ctx = ProviderContext {
            api_key,
            base_url: cfg.provider.base_url.clone(),
        };
        Self::new(provider, ctx, CompletionSettings::from_config(cfg))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn build_window(&self, history: &[ChatMessage], input: &str) -> Vec<ChatMessage> {
        let start = history.len().saturating_sub(self.settings.context_window);
        let mut window = history[start..].to_vec();
        window.push(ChatMessage::user(input));
        window
    }

    pub async fn test_connection(&self) -> Result<ConnectionReport, AppError> {
        let started = Instant::now();
        let status_code = self
            .provider
            .test_connection(&self.client, &self.ctx)
            .await?;
        Ok(ConnectionReport {
            status_code,
            duration_ms: started.elapsed().as_millis(),
        })
    }
}

#[async_trait]
impl ReplyFetcher for ChatService {
    async fn fetch_reply(&self, history: &[ChatMessage], input: &str) -> String {
        let window = self.build_window(history, input);
        let request = CompletionRequest {
            model: &self.settings.model,
            system: &self.settings.system_prompt,
            messages: &window,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        tracing::debug!(
            provider = self.provider.name(),
            model = %self.settings.model,
            window = window.len(),
            "requesting completion"
        );
        let started = Instant::now();
        match self
            .provider
            .complete(&self.client, &self.ctx, &request)
            .await
        {
            Ok(text) => {
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    chars = text.chars().count(),
                    "completion received"
                );
                text
            }
            Err(err) => {
                tracing::warn!(provider = self.provider.name(), error = %err, "completion failed");
                err.display_text()
            }
        }
    }
}
