mod config;
mod error;
mod history;
mod limiter;
mod models;
mod providers;
mod service;
mod session;
mod ui;

use chrono::Local;
use clap::{Parser, Subcommand};
use config::{
    config_path, ensure_initialized, init_config, load_config, log_path,
    normalize_provider_name, resolve_api_key, set_api_key, validate_api_key,
};
use error::AppError;
use models::Variant;
use service::ChatService;
use session::{ChatSession, DisplayEvent};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use ui::run::run_tui;

#[derive(Debug, Parser)]
#[command(name = "chat-tutor")]
#[command(about = "Practice English conversation with a hosted LLM tutor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a config preset for one of the variants.
    Init {
        #[arg(long, value_enum, default_value_t = Variant::Classic)]
        variant: Variant,
        #[arg(long)]
        force: bool,
    },
    /// Store a provider API key in the OS keyring.
    SetKey {
        provider: String,
        #[arg(long)]
        api_key: String,
    },
    /// Check that the configured key is accepted by the provider.
    TestKey { provider: Option<String> },
    /// Send one message and print the reply.
    Ask {
        message: String,
        #[arg(long)]
        json: bool,
    },
    /// Open the interactive chat.
    Chat,
}

fn init_tracing(log_file: Option<PathBuf>) -> Result<(), AppError> {
    let default_filter = if log_file.is_some() {
        "chat_tutor=info,warn"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("CHAT_TUTOR_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn refusal_reason(events: &[DisplayEvent]) -> Option<&str> {
    events.iter().find_map(DisplayEvent::refusal_reason)
}

fn print_events(events: &[DisplayEvent]) {
    for event in events {
        match event {
            DisplayEvent::AssistantMessage { content } => println!("{content}"),
            DisplayEvent::UsageUpdated { usage } => eprintln!(
                "usage: {}/{} today, {}/{} this hour, {} total",
                usage.today,
                usage.limits.daily_messages,
                usage.this_hour,
                usage.limits.hourly_messages,
                usage.total
            ),
            DisplayEvent::UserMessage { .. }
            | DisplayEvent::InputRejected { .. }
            | DisplayEvent::SendDenied { .. } => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    if let Commands::Chat = cli.command {
        ensure_initialized()?;
        init_tracing(Some(log_path()?))?;
    } else {
        init_tracing(None)?;
    }

    match cli.command {
        Commands::Init { variant, force } => {
            if init_config(variant, force)? {
                println!(
                    "Wrote '{}' config to {}",
                    variant.as_label(),
                    config_path()?.display()
                );
            } else {
                println!(
                    "Config already exists at {} (use --force to overwrite).",
                    config_path()?.display()
                );
            }
        }
        Commands::SetKey { provider, api_key } => {
            let provider = normalize_provider_name(&provider);
            validate_api_key(&provider, &api_key)?;
            set_api_key(&provider, api_key.trim())?;
            println!("API key stored for '{provider}'.");
        }
        Commands::TestKey { provider } => {
            ensure_initialized()?;
            let mut cfg = load_config()?;
            if let Some(provider) = provider {
                cfg.provider.name = normalize_provider_name(&provider);
            }
            let api_key = resolve_api_key(&cfg.provider.name)?;
            let service = ChatService::from_config(&cfg, api_key)?;
            let report = service.test_connection().await?;
            println!(
                "Provider '{}' accepted the key in {}ms.",
                service.provider_name(),
                report.duration_ms
            );
        }
        Commands::Ask { message, json } => {
            ensure_initialized()?;
            let cfg = load_config()?;
            let api_key = resolve_api_key(&cfg.provider.name)?;
            let service = ChatService::from_config(&cfg, api_key)?;
            let now = Local::now().naive_local();
            let mut session = ChatSession::from_config(&cfg, now);

            let events = session.handle_user_message(&message, now, &service).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                print_events(&events);
            }
            if let Some(reason) = refusal_reason(&events) {
                return Err(AppError::Rejected(reason.to_string()));
            }
        }
        Commands::Chat => {
            let cfg = load_config()?;
            let api_key = resolve_api_key(&cfg.provider.name)?;
            let service = ChatService::from_config(&cfg, api_key)?;
            run_tui(&cfg, &service).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_reason_prefers_first_refusal() {
        let events = vec![DisplayEvent::InputRejected {
            reason: "input is empty".into(),
        }];
        assert_eq!(refusal_reason(&events), Some("input is empty"));
    }

    #[test]
    fn refusal_reason_is_none_for_accepted_message() {
        let events = vec![
            DisplayEvent::UserMessage {
                content: "hi".into(),
            },
            DisplayEvent::AssistantMessage {
                content: "hello".into(),
            },
        ];
        assert!(refusal_reason(&events).is_none());
    }

    #[test]
    fn cli_parses_init_variant() {
        let cli = Cli::try_parse_from(["chat-tutor", "init", "--variant", "limited"])
            .expect("parse init");
        match cli.command {
            Commands::Init { variant, force } => {
                assert_eq!(variant, Variant::Limited);
                assert!(!force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
