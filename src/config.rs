use crate::error::AppError;
use crate::limiter::UsageLimits;
use crate::models::Variant;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SERVICE_NAME: &str = "chat-tutor";
const ENV_PREFIX: &str = "CHAT_TUTOR";
const MAX_RATE_LIMIT_SECONDS: u32 = 86_400;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly and patient English teacher. \
Help students learn English through natural conversation. Provide corrections when needed, \
explain grammar concepts clearly, and encourage practice. Keep responses conversational and supportive.";

pub const DEFAULT_WELCOME_MESSAGE: &str = "Hello! I'm your English learning assistant. I can help you with:\n\n\
- Grammar questions\n- Conversation practice\n- Vocabulary building\n- Writing assistance\n- Pronunciation tips\n\n\
What would you like to practice today?";

pub fn normalize_provider_name(provider: &str) -> String {
    provider.trim().to_ascii_lowercase()
}

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("CHAT_TUTOR_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("com", "chat-tutor", SERVICE_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".chat-tutor"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub variant: Variant,
    pub provider: ProviderSettings,
    pub chat: ChatSettings,
    pub limits: LimitSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatSettings {
    pub max_tokens: u32,
    pub temperature: f64,
    pub context_window: usize,
    pub max_message_length: usize,
    pub system_prompt: String,
    pub welcome_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitSettings {
    pub enabled: bool,
    pub daily_messages: u32,
    pub hourly_messages: u32,
    pub rate_limit_seconds: u32,
}

impl AppConfig {
    pub fn for_variant(variant: Variant) -> Self {
        let provider = match variant {
            Variant::Classic | Variant::Limited => ProviderSettings {
                name: "anthropic".into(),
                model: "claude-3-haiku-20240307".into(),
                base_url: None,
            },
            Variant::Openai => ProviderSettings {
                name: "openai".into(),
                model: "gpt-4o-mini".into(),
                base_url: None,
            },
        };

        Self {
            variant,
            provider,
            chat: ChatSettings {
                max_tokens: variant.max_tokens(),
                context_window: variant.context_window(),
                max_message_length: variant.max_message_length(),
                ..ChatSettings::default()
            },
            limits: LimitSettings {
                enabled: variant == Variant::Limited,
                ..LimitSettings::default()
            },
        }
    }

    pub fn usage_limits(&self) -> Option<UsageLimits> {
        self.limits.enabled.then_some(UsageLimits {
            daily_messages: self.limits.daily_messages,
            hourly_messages: self.limits.hourly_messages,
            rate_limit_seconds: self.limits.rate_limit_seconds,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::for_variant(Variant::default())
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: "anthropic".into(),
            model: "claude-3-haiku-20240307".into(),
            base_url: None,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        let variant = Variant::default();
        Self {
            max_tokens: variant.max_tokens(),
            temperature: 0.7,
            context_window: variant.context_window(),
            max_message_length: variant.max_message_length(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.into(),
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        let limits = UsageLimits::default();
        Self {
            enabled: false,
            daily_messages: limits.daily_messages,
            hourly_messages: limits.hourly_messages,
            rate_limit_seconds: limits.rate_limit_seconds,
        }
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn data_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("data"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn log_path() -> Result<PathBuf, AppError> {
    Ok(data_dir()?.join("chat-tutor.log"))
}

pub fn ensure_dirs() -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    fs::create_dir_all(data_dir()?)?;
    Ok(())
}

fn migrate_plaintext_api_key(path: &Path) -> Result<bool, AppError> {
    let raw_str = fs::read_to_string(path)?;
    let mut raw: toml::Value = toml::from_str(&raw_str)?;

    let Some(provider) = raw.get_mut("provider").and_then(toml::Value::as_table_mut) else {
        return Ok(false);
    };
    let Some(key) = provider.remove("api_key") else {
        return Ok(false);
    };

    let name = provider
        .get("name")
        .and_then(toml::Value::as_str)
        .map(normalize_provider_name)
        .unwrap_or_else(|| ProviderSettings::default().name);
    if let Some(key) = key.as_str().filter(|k| !k.is_empty()) {
        set_api_key(&name, key)?;
        tracing::info!(provider = %name, "moved plaintext api key into keyring");
    }

    fs::write(path, toml::to_string_pretty(&raw)?)?;
    Ok(true)
}

fn normalize_config(config: &mut AppConfig) {
    config.provider.name = normalize_provider_name(&config.provider.name);
    config.provider.model = config.provider.model.trim().to_string();
    config.provider.base_url = config
        .provider
        .base_url
        .take()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
}

pub fn validate_config(config: &AppConfig) -> Result<(), AppError> {
    if !matches!(config.provider.name.as_str(), "anthropic" | "openai") {
        return Err(AppError::Config(format!(
            "Unsupported provider '{}'. Use anthropic or openai.",
            config.provider.name
        )));
    }
    if config.provider.model.is_empty() {
        return Err(AppError::Config("provider.model must not be empty".into()));
    }
    if let Some(base) = &config.provider.base_url {
        url::Url::parse(base)
            .map_err(|e| AppError::Config(format!("provider.base_url is not valid: {e}")))?;
    }
    if !(0.0..=2.0).contains(&config.chat.temperature) {
        return Err(AppError::Config(
            "chat.temperature must be between 0 and 2".into(),
        ));
    }
    if config.chat.max_tokens == 0 {
        return Err(AppError::Config("chat.max_tokens must be positive".into()));
    }
    if config.chat.context_window == 0 {
        return Err(AppError::Config(
            "chat.context_window must be positive".into(),
        ));
    }
    if config.chat.max_message_length == 0 {
        return Err(AppError::Config(
            "chat.max_message_length must be positive".into(),
        ));
    }
    if config.limits.enabled {
        if config.limits.daily_messages == 0 || config.limits.hourly_messages == 0 {
            return Err(AppError::Config(
                "limits.daily_messages and limits.hourly_messages must be positive".into(),
            ));
        }
        if config.limits.rate_limit_seconds > MAX_RATE_LIMIT_SECONDS {
            return Err(AppError::Config(format!(
                "limits.rate_limit_seconds must be at most {MAX_RATE_LIMIT_SECONDS}"
            )));
        }
    }
    Ok(())
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

// The variant picks the preset that the file and env values are laid over.
fn layered_config(path: &Path) -> Result<AppConfig, AppError> {
    let user_layers = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(env_source())
        .build()?;
    let variant = match user_layers.get::<Variant>("variant") {
        Ok(variant) => variant,
        Err(config::ConfigError::NotFound(_)) => Variant::default(),
        Err(e) => return Err(e.into()),
    };

    let preset = toml::to_string(&AppConfig::for_variant(variant))?;
    let settings = config::Config::builder()
        .add_source(config::File::from_str(&preset, config::FileFormat::Toml))
        .add_source(config::File::from(path).required(false))
        .add_source(env_source())
        .build()?;

    let mut parsed: AppConfig = settings.try_deserialize()?;
    normalize_config(&mut parsed);
    validate_config(&parsed)?;
    Ok(parsed)
}

pub fn load_config() -> Result<AppConfig, AppError> {
    let path = config_path()?;
    if path.exists() {
        migrate_plaintext_api_key(&path)?;
    }
    layered_config(&path)
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    ensure_dirs()?;
    let path = config_path()?;
    let raw = toml::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

fn key_entry(provider: &str) -> Result<keyring::Entry, AppError> {
    let normalized = normalize_provider_name(provider);
    Ok(keyring::Entry::new(
        SERVICE_NAME,
        &format!("provider:{normalized}"),
    )?)
}

pub fn set_api_key(provider: &str, key: &str) -> Result<(), AppError> {
    key_entry(provider)?.set_password(key)?;
    Ok(())
}

pub fn get_api_key(provider: &str) -> Result<String, AppError> {
    let normalized = normalize_provider_name(provider);
    if let Ok(value) = key_entry(&normalized)?.get_password() {
        if !value.is_empty() {
            return Ok(value);
        }
    }

    let env_name = format!(
        "{}_API_KEY",
        normalized.to_ascii_uppercase().replace('-', "_")
    );
    if let Ok(value) = std::env::var(env_name) {
        if !value.is_empty() {
            return Ok(value);
        }
    }

    Err(AppError::Config(format!(
        "No API key found for provider '{normalized}'. Run `chat-tutor set-key {normalized}` or set the env var."
    )))
}

pub fn validate_api_key(provider: &str, key: &str) -> Result<(), AppError> {
    let normalized = normalize_provider_name(provider);
    let prefix = match normalized.as_str() {
        "anthropic" => "sk-ant-",
        "openai" => "sk-",
        other => {
            return Err(AppError::Config(format!(
                "Unsupported provider '{other}'."
            )))
        }
    };
    if !key.trim().starts_with(prefix) {
        return Err(AppError::Config(format!(
            "Invalid API key format for '{normalized}': expected a key starting with '{prefix}'."
        )));
    }
    Ok(())
}

pub fn resolve_api_key(provider: &str) -> Result<String, AppError> {
    let key = get_api_key(provider)?;
    validate_api_key(provider, &key)?;
    Ok(key.trim().to_string())
}

pub fn ensure_initialized() -> Result<(), AppError> {
    init_config(Variant::default(), false).map(|_| ())
}

pub fn init_config(variant: Variant, force: bool) -> Result<bool, AppError> {
    ensure_dirs()?;
    let cfg_path = config_path()?;
    if cfg_path.exists() && !force {
        return Ok(false);
    }
    save_config(&AppConfig::for_variant(variant))?;
    Ok(true)
}
