use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Classic,
    Limited,
    Openai,
}

impl Variant {
    pub fn as_label(self) -> &'static str {
        match self {
            Variant::Classic => "classic",
            Variant::Limited => "limited",
            Variant::Openai => "openai",
        }
    }

    pub fn context_window(self) -> usize {
        match self {
            Variant::Classic => 8,
            Variant::Limited => 6,
            Variant::Openai => 10,
        }
    }

    pub fn max_tokens(self) -> u32 {
        match self {
            Variant::Classic => 400,
            Variant::Limited => 300,
            Variant::Openai => 500,
        }
    }

    pub fn max_message_length(self) -> usize {
        match self {
            Variant::Limited => 500,
            Variant::Classic | Variant::Openai => 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_serializes_with_lowercase_role() {
        let raw = serde_json::to_value(ChatMessage::user("hello")).expect("serialize");
        assert_eq!(raw["role"], "user");
        assert_eq!(raw["content"], "hello");
    }

    #[test]
    fn variants_use_distinct_context_windows() {
        assert_eq!(Variant::Classic.context_window(), 8);
        assert_eq!(Variant::Limited.context_window(), 6);
        assert_eq!(Variant::Openai.context_window(), 10);
        assert_eq!(Variant::Limited.max_message_length(), 500);
    }
}
