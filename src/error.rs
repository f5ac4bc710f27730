use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("message not sent: {0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Settings(#[from] config::ConfigError),

    #[error(transparent)]
    Keyring(#[from] keyring::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rate limit reached")]
    RateLimited,

    #[error("{status}: {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn display_text(&self) -> String {
        match self {
            ProviderError::RateLimited => {
                "Rate limit reached. Please try again in a moment.".to_string()
            }
            ProviderError::Api { .. } => format!("API Error: {self}"),
            ProviderError::Transport(e) => format!("Sorry, I encountered an error: {e}"),
            ProviderError::Malformed(detail) => {
                format!("Sorry, I encountered an error: {detail}")
            }
        }
    }
}
