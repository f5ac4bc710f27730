use crate::config::AppConfig;
use crate::history::ChatHistory;
use crate::limiter::{UsageLimits, UsageSnapshot, UsageTracker};
use crate::models::ChatMessage;
use crate::service::ReplyFetcher;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

pub const NEW_TOPIC_KEEP: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisplayEvent {
    UserMessage {
        content: String,
    },
    AssistantMessage {
        content: String,
    },
    InputRejected {
        reason: String,
    },
    SendDenied {
        reason: String,
        message: String,
        retry_after_ms: Option<i64>,
    },
    UsageUpdated {
        usage: UsageSnapshot,
    },
}

impl DisplayEvent {
    pub fn refusal_reason(&self) -> Option<&str> {
        match self {
            DisplayEvent::InputRejected { reason } => Some(reason.as_str()),
            DisplayEvent::SendDenied { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRejection {
    Empty,
    TooLong { length: usize, max: usize },
}

impl fmt::Display for InputRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRejection::Empty => write!(f, "input is empty"),
            InputRejection::TooLong { length, max } => {
                write!(f, "message too long ({length}/{max} characters)")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_message_length: usize,
    pub welcome_message: String,
}

impl SessionSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_message_length: cfg.chat.max_message_length,
            welcome_message: cfg.chat.welcome_message.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    history: ChatHistory,
    tracker: Option<UsageTracker>,
    settings: SessionSettings,
}

impl ChatSession {
    pub fn new(settings: SessionSettings, limits: Option<UsageLimits>, now: NaiveDateTime) -> Self {
        let mut session = Self {
            history: ChatHistory::new(),
            tracker: limits.map(|l| UsageTracker::new(l, now)),
            settings,
        };
        session.greet();
        session
    }

    pub fn from_config(cfg: &AppConfig, now: NaiveDateTime) -> Self {
        Self::new(SessionSettings::from_config(cfg), cfg.usage_limits(), now)
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn usage(&self) -> Option<UsageSnapshot> {
        self.tracker.as_ref().map(UsageTracker::snapshot)
    }

    pub fn max_message_length(&self) -> usize {
        self.settings.max_message_length
    }

    pub fn validate_input<'a>(&self, input: &'a str) -> Result<&'a str, InputRejection> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(InputRejection::Empty);
        }
        let length = trimmed.chars().count();
        if length > self.settings.max_message_length {
            return Err(InputRejection::TooLong {
                length,
                max: self.settings.max_message_length,
            });
        }
        Ok(trimmed)
    }

    pub async fn handle_user_message(
        &mut self,
        input: &str,
        now: NaiveDateTime,
        fetcher: &dyn ReplyFetcher,
    ) -> Vec<DisplayEvent> {
        let text = match self.validate_input(input) {
            Ok(text) => text,
            Err(rejection) => {
                tracing::info!(%rejection, "input rejected");
                return vec![DisplayEvent::InputRejected {
                    reason: rejection.to_string(),
                }];
            }
        };

        if let Some(tracker) = self.tracker.as_mut() {
            match tracker.check(now) {
                Ok(permit) => tracker.record(permit),
                Err(denial) => {
                    tracing::info!(reason = denial.reason(), "send denied by usage limits");
                    return vec![DisplayEvent::SendDenied {
                        reason: denial.reason().to_string(),
                        message: denial.to_string(),
                        retry_after_ms: denial.retry_after().map(|d| d.num_milliseconds()),
                    }];
                }
            }
        }

        let reply = fetcher.fetch_reply(self.history.messages(), text).await;
        self.history.push(ChatMessage::user(text));
        self.history.push(ChatMessage::assistant(reply.clone()));

        let mut events = vec![
            DisplayEvent::UserMessage {
                content: text.to_string(),
            },
            DisplayEvent::AssistantMessage { content: reply },
        ];
        if let Some(usage) = self.usage() {
            events.push(DisplayEvent::UsageUpdated { usage });
        }
        events
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.greet();
        tracing::info!("conversation cleared");
    }

    pub fn new_topic(&mut self) {
        self.history.truncate_to_last(NEW_TOPIC_KEEP);
        tracing::info!(kept = self.history.len(), "started new topic");
    }

    fn greet(&mut self) {
        if self.history.is_empty() && !self.settings.welcome_message.trim().is_empty() {
            self.history
                .push(ChatMessage::assistant(self.settings.welcome_message.clone()));
        }
    }
}
