use serde_json::{json, Value};
use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_chat-tutor")
}

fn command(home: &TempDir, args: &[&str]) -> Command {
    let mut cmd = Command::new(bin_path());
    cmd.args(args)
        .env("CHAT_TUTOR_HOME", home.path())
        .env_remove("CHAT_TUTOR_LOG")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("OPENAI_API_KEY");
    cmd
}

fn run_cmd(home: &TempDir, args: &[&str]) -> Output {
    command(home, args).output().expect("run chat-tutor command")
}

fn run_with_key(home: &TempDir, args: &[&str], key: &str) -> Output {
    command(home, args)
        .env("ANTHROPIC_API_KEY", key)
        .output()
        .expect("run chat-tutor command")
}

fn config_text(home: &TempDir) -> String {
    fs::read_to_string(home.path().join("config").join("config.toml")).expect("read config")
}

#[test]
fn init_creates_config_and_data_paths() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["init"]);
    assert!(output.status.success());

    assert!(home.path().join("config").join("config.toml").exists());
    assert!(home.path().join("data").exists());
    assert!(config_text(&home).contains("variant = \"classic\""));
}

#[test]
fn init_is_idempotent() {
    let home = TempDir::new().expect("temp home");

    assert!(run_cmd(&home, &["init"]).status.success());
    let first = config_text(&home);

    assert!(run_cmd(&home, &["init", "--variant", "openai"]).status.success());
    let second = config_text(&home);

    assert_eq!(first, second);
}

#[test]
fn init_force_writes_limited_preset() {
    let home = TempDir::new().expect("temp home");
    assert!(run_cmd(&home, &["init"]).status.success());

    let output = run_cmd(&home, &["init", "--variant", "limited", "--force"]);
    assert!(output.status.success());

    let raw = config_text(&home);
    let parsed: toml::Value = toml::from_str(&raw).expect("valid toml");
    assert_eq!(parsed["variant"].as_str(), Some("limited"));
    assert_eq!(parsed["limits"]["enabled"].as_bool(), Some(true));
    assert_eq!(parsed["chat"]["max_message_length"].as_integer(), Some(500));
}

#[test]
fn ask_rejects_overlong_message_before_any_request() {
    let home = TempDir::new().expect("temp home");
    assert!(run_cmd(&home, &["init", "--variant", "limited"]).status.success());

    let message = "a".repeat(501);
    let output = command(&home, &["ask", &message])
        .env("ANTHROPIC_API_KEY", "sk-ant-test")
        .env("CHAT_TUTOR_PROVIDER__BASE_URL", "http://127.0.0.1:9")
        .output()
        .expect("run ask");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("message too long (501/500 characters)"));
}

#[test]
fn ask_without_key_reports_configuration_error() {
    let home = TempDir::new().expect("temp home");
    assert!(run_cmd(&home, &["init"]).status.success());

    let output = run_cmd(&home, &["ask", "hello"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No API key found"));
}

#[test]
fn ask_with_malformed_key_reports_configuration_error() {
    let home = TempDir::new().expect("temp home");
    assert!(run_cmd(&home, &["init"]).status.success());

    let output = run_with_key(&home, &["ask", "hello"], "not-a-real-key");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid API key format"));
}

#[test]
fn set_key_rejects_wrong_prefix() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["set-key", "anthropic", "--api-key", "sk-wrong"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("expected a key starting with 'sk-ant-'"));
}

#[test]
fn invalid_temperature_in_config_is_rejected() {
    let home = TempDir::new().expect("temp home");
    assert!(run_cmd(&home, &["init"]).status.success());

    let output = command(&home, &["ask", "hello"])
        .env("ANTHROPIC_API_KEY", "sk-ant-test")
        .env("CHAT_TUTOR_CHAT__TEMPERATURE", "3.5")
        .output()
        .expect("run ask");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("chat.temperature must be between 0 and 2"));
}

#[tokio::test]
async fn ask_prints_reply_from_provider_as_json_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Great sentence! Try 'I have been'."}],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().expect("temp home");
    assert!(run_cmd(&home, &["init", "--variant", "limited"]).status.success());

    let base_url = server.uri();
    let home_path = home.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        Command::new(bin_path())
            .args(["ask", "I am here since Monday.", "--json"])
            .env("CHAT_TUTOR_HOME", home_path)
            .env("ANTHROPIC_API_KEY", "sk-ant-test")
            .env("CHAT_TUTOR_PROVIDER__BASE_URL", base_url)
            .env_remove("CHAT_TUTOR_LOG")
            .output()
            .expect("run ask")
    })
    .await
    .expect("join ask");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let events: Value = serde_json::from_slice(&output.stdout).expect("json events");
    let events = events.as_array().expect("event array");
    assert_eq!(events[0]["event"], "user_message");
    assert_eq!(events[1]["event"], "assistant_message");
    assert_eq!(events[1]["content"], "Great sentence! Try 'I have been'.");
    assert_eq!(events[2]["event"], "usage_updated");
    assert_eq!(events[2]["usage"]["today"], 1);
}
