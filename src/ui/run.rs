use crate::config::AppConfig;
use crate::error::AppError;
use crate::limiter::UsageSnapshot;
use crate::models::{ChatMessage, ChatRole};
use crate::service::ChatService;
use crate::session::ChatSession;
use crate::ui::app::{AppState, ConfirmAction, Notice, Screen};
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;
use std::io;
use std::time::Duration as StdDuration;

const COLOR_ACCENT: Color = Color::Cyan;
const COLOR_INFO: Color = Color::Green;
const COLOR_MUTED: Color = Color::DarkGray;
const COLOR_HEADER: Color = Color::White;
const COLOR_WARN: Color = Color::Yellow;

const LEARNING_TIPS: [&str; 5] = [
    "Can you explain when to use 'a' vs 'an'?",
    "Help me practice past tense",
    "What's the difference between 'affect' and 'effect'?",
    "Can you check my grammar in this sentence?",
    "Let's have a conversation about travel",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Handled,
    Send,
    TestConnection,
}

pub async fn run_tui(cfg: &AppConfig, service: &ChatService) -> Result<(), AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let loop_result = run_loop(&mut terminal, cfg, service).await;

    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    loop_result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    cfg: &AppConfig,
    service: &ChatService,
) -> Result<(), AppError> {
    let mut session = ChatSession::from_config(cfg, Local::now().naive_local());
    let mut state = AppState::default();
    tracing::info!(
        provider = service.provider_name(),
        model = service.model(),
        variant = cfg.variant.as_label(),
        "chat session started"
    );

    while state.running {
        terminal.draw(|f| render(f, cfg, service, &session, &state))?;

        if !event::poll(StdDuration::from_millis(250))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match handle_key(key.code, key.modifiers, &mut state, &mut session) {
            KeyOutcome::Handled => {}
            KeyOutcome::Send => {
                let input = state.input.clone();
                state.pending_input = Some(input.trim().to_string());
                state.status = "tutor is thinking...".into();
                terminal.draw(|f| render(f, cfg, service, &session, &state))?;

                let events = session
                    .handle_user_message(&input, Local::now().naive_local(), service)
                    .await;
                state.apply_events(&events);
            }
            KeyOutcome::TestConnection => {
                state.status = "testing connection...".into();
                terminal.draw(|f| render(f, cfg, service, &session, &state))?;
                match service.test_connection().await {
                    Ok(report) => {
                        state.status = format!(
                            "connection ok{} in {}ms",
                            report
                                .status_code
                                .map(|s| format!(" (HTTP {s})"))
                                .unwrap_or_default(),
                            report.duration_ms
                        );
                    }
                    Err(e) => {
                        state.status = "connection failed".into();
                        state.show_error(format!("Connection test failed: {e}"));
                    }
                }
            }
        }
    }

    Ok(())
}

fn handle_key(
    code: KeyCode,
    modifiers: KeyModifiers,
    state: &mut AppState,
    session: &mut ChatSession,
) -> KeyOutcome {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && code == KeyCode::Char('c') {
        if !matches!(state.screen, Screen::Confirm(ConfirmAction::Quit)) {
            state.open_confirm(ConfirmAction::Quit);
        }
        return KeyOutcome::Handled;
    }

    match state.screen.clone() {
        Screen::Chat => match code {
            KeyCode::Esc => state.open_confirm(ConfirmAction::Quit),
            KeyCode::Enter => return KeyOutcome::Send,
            KeyCode::Char('l') if ctrl => state.open_confirm(ConfirmAction::ClearConversation),
            KeyCode::Char('n') if ctrl => {
                session.new_topic();
                state.scroll_from_bottom = 0;
                state.notice = Notice::None;
                state.status = "new topic: kept the last 2 messages".into();
            }
            KeyCode::Char('t') if ctrl => return KeyOutcome::TestConnection,
            KeyCode::F(1) => {
                state.previous_screen = Screen::Chat;
                state.screen = Screen::Tips;
            }
            KeyCode::F(2) => {
                state.compact_mode = !state.compact_mode;
                state.status = if state.compact_mode {
                    "compact mode enabled".into()
                } else {
                    "compact mode disabled".into()
                };
            }
            KeyCode::PageUp | KeyCode::Up => {
                let step = if code == KeyCode::PageUp { 10 } else { 1 };
                state.scroll_from_bottom = state.scroll_from_bottom.saturating_add(step);
            }
            KeyCode::PageDown | KeyCode::Down => {
                let step = if code == KeyCode::PageDown { 10 } else { 1 };
                state.scroll_from_bottom = state.scroll_from_bottom.saturating_sub(step);
            }
            KeyCode::Backspace => {
                state.input.pop();
            }
            KeyCode::Char(c) if !ctrl => state.input.push(c),
            _ => {}
        },
        Screen::Confirm(action) => match code {
            KeyCode::Esc => state.screen = state.previous_screen.clone(),
            KeyCode::Left => {
                if state.confirm_selected > 0 {
                    state.confirm_selected -= 1;
                }
            }
            KeyCode::Right => {
                if state.confirm_selected < 1 {
                    state.confirm_selected += 1;
                }
            }
            KeyCode::Enter => {
                if state.confirm_selected == 0 {
                    state.screen = state.previous_screen.clone();
                    return KeyOutcome::Handled;
                }
                match action {
                    ConfirmAction::Quit => state.running = false,
                    ConfirmAction::ClearConversation => {
                        session.clear();
                        state.scroll_from_bottom = 0;
                        state.notice = Notice::None;
                        state.status = "conversation cleared".into();
                        state.screen = Screen::Chat;
                    }
                }
            }
            _ => {}
        },
        Screen::Tips | Screen::ErrorDialog => {
            if matches!(code, KeyCode::Enter | KeyCode::Esc) {
                state.screen = state.previous_screen.clone();
            }
        }
    }

    KeyOutcome::Handled
}

fn transcript_lines(messages: &[ChatMessage], pending: Option<&str>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut push_message = |role: ChatRole, content: &str| {
        let (label, color) = match role {
            ChatRole::User => ("You", COLOR_ACCENT),
            ChatRole::Assistant => ("Tutor", COLOR_INFO),
        };
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        for text in content.lines() {
            lines.push(Line::from(text.to_string()));
        }
    };

    for message in messages {
        push_message(message.role, &message.content);
    }
    if let Some(text) = pending {
        push_message(ChatRole::User, text);
    }
    lines
}

fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn input_counter(input: &str, max: usize) -> (String, bool) {
    let length = input.trim().chars().count();
    (format!("{length}/{max}"), length > max)
}

fn usage_lines(usage: Option<UsageSnapshot>) -> Vec<Line<'static>> {
    let Some(usage) = usage else {
        return vec![Line::from(Span::styled(
            "No usage limits",
            Style::default().fg(COLOR_MUTED),
        ))];
    };
    let limits = usage.limits;
    vec![
        Line::from(format!("Today: {}/{}", usage.today, limits.daily_messages)),
        Line::from(format!(
            "This hour: {}/{}",
            usage.this_hour, limits.hourly_messages
        )),
        Line::from(format!("Total: {}", usage.total)),
        Line::from(Span::styled(
            format!("Min interval: {}s", limits.rate_limit_seconds),
            Style::default().fg(COLOR_MUTED),
        )),
    ]
}

fn render(
    f: &mut ratatui::Frame,
    cfg: &AppConfig,
    service: &ChatService,
    session: &ChatSession,
    state: &AppState,
) {
    let size = f.area();
    let compact = state.compact_mode || size.width < 90;

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(size);

    let header = Paragraph::new(format!(
        " chat-tutor  ·  {}  ·  {} ",
        service.model(),
        state.status
    ))
    .block(Block::default().borders(Borders::ALL).title(" English Practice "))
    .style(Style::default().fg(COLOR_HEADER));
    f.render_widget(header, root[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(if compact {
            [Constraint::Percentage(100), Constraint::Percentage(0)]
        } else {
            [Constraint::Percentage(70), Constraint::Percentage(30)]
        })
        .split(root[1]);

    render_transcript(f, body[0], session, state);
    if !compact {
        render_sidebar(f, body[1], cfg, service, session, state);
    }

    let notice = match &state.notice {
        Notice::None => Paragraph::new(""),
        Notice::Warning(text) => {
            Paragraph::new(format!(" {text}")).style(Style::default().fg(COLOR_WARN))
        }
    };
    f.render_widget(notice, root[2]);

    let (counter, over_limit) = input_counter(&state.input, session.max_message_length());
    let input = Paragraph::new(format!("{}_", state.input))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Message ({counter}) ")),
        )
        .style(if over_limit {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(COLOR_HEADER)
        });
    f.render_widget(input, root[3]);

    let footer = Paragraph::new(footer_text(state))
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(COLOR_MUTED));
    f.render_widget(footer, root[4]);

    match &state.screen {
        Screen::Chat => {}
        Screen::Confirm(action) => render_confirm(f, state, action),
        Screen::Tips => render_tips(f),
        Screen::ErrorDialog => render_error(f, state),
    }
}

fn render_transcript(f: &mut ratatui::Frame, area: Rect, session: &ChatSession, state: &AppState) {
    let lines = transcript_lines(
        session.history().messages(),
        state.pending_input.as_deref(),
    );
    let inner_height = area.height.saturating_sub(2);
    let total = wrapped_height(&lines, area.width.saturating_sub(2));
    let max_offset = total.saturating_sub(inner_height);
    let offset = max_offset.saturating_sub(state.scroll_from_bottom);

    let transcript = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Conversation "))
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    f.render_widget(transcript, area);
}

fn render_sidebar(
    f: &mut ratatui::Frame,
    area: Rect,
    cfg: &AppConfig,
    service: &ChatService,
    session: &ChatSession,
    state: &AppState,
) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(6),
            Constraint::Min(6),
        ])
        .split(area);

    let controls = Paragraph::new(vec![
        Line::from("Ctrl+L  clear conversation"),
        Line::from("Ctrl+N  new topic"),
        Line::from("Ctrl+T  test connection"),
        Line::from("F1      learning tips"),
        Line::from("PgUp/Dn scroll"),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Chat Controls "));
    f.render_widget(controls, sections[0]);

    let usage = Paragraph::new(usage_lines(session.usage()))
        .block(Block::default().borders(Borders::ALL).title(" Usage "))
        .style(Style::default().fg(COLOR_INFO));
    f.render_widget(usage, sections[1]);

    let info = Paragraph::new(vec![
        Line::from(format!("Model: {}", service.model())),
        Line::from(format!("Provider: {}", service.provider_name())),
        Line::from(format!("Variant: {}", cfg.variant.as_label())),
        Line::from(format!("Messages: {}", session.history().len())),
        Line::from(format!("Status: {}", state.status)),
    ])
    .block(Block::default().borders(Borders::ALL).title(" App Info "))
    .wrap(Wrap { trim: true });
    f.render_widget(info, sections[2]);
}

fn footer_text(state: &AppState) -> &'static str {
    match state.screen {
        Screen::Chat => {
            "Enter send | Ctrl+L clear | Ctrl+N new topic | F1 tips | F2 compact | PgUp/PgDn scroll | Esc quit"
        }
        Screen::Confirm(_) => "Left/Right choose | Enter confirm | Esc cancel",
        Screen::Tips | Screen::ErrorDialog => "Enter/Esc close",
    }
}

fn render_confirm(f: &mut ratatui::Frame, state: &AppState, action: &ConfirmAction) {
    let area = centered_rect(56, 34, f.area());
    f.render_widget(Clear, area);

    let (title, message, consequence) = match action {
        ConfirmAction::Quit => (
            "Confirm Quit",
            "Do you want to exit chat-tutor?",
            "Consequence: the conversation is not saved.",
        ),
        ConfirmAction::ClearConversation => (
            "Confirm Clear",
            "Clear the whole conversation?",
            "Consequence: all messages are removed; usage counters are kept.",
        ),
    };

    let cancel_style = if state.confirm_selected == 0 {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let confirm_style = if state.confirm_selected == 1 {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Red)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let content = Paragraph::new(vec![
        Line::from(message),
        Line::from(Span::styled(consequence, Style::default().fg(COLOR_MUTED))),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Cancel (Esc)]", cancel_style),
            Span::raw("   "),
            Span::styled("[Confirm (Enter)]", confirm_style),
        ]),
        Line::from("Use Left/Right to choose"),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", title)),
    )
    .alignment(Alignment::Center);

    f.render_widget(content, area);
}

fn render_tips(f: &mut ratatui::Frame) {
    let area = centered_rect(70, 50, f.area());
    f.render_widget(Clear, area);
    let mut lines = vec![Line::from(Span::styled(
        "Try asking:",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    lines.extend(
        LEARNING_TIPS
            .iter()
            .map(|tip| Line::from(format!("  - \"{tip}\""))),
    );
    lines.push(Line::from(""));
    lines.push(Line::from("Press Enter or Esc"));

    let content = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Learning Tips "))
        .style(Style::default().fg(COLOR_ACCENT))
        .wrap(Wrap { trim: true });
    f.render_widget(content, area);
}

fn render_error(f: &mut ratatui::Frame, state: &AppState) {
    let area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, area);
    let content = Paragraph::new(vec![
        Line::from(state.error_message.clone()),
        Line::from(""),
        Line::from("Press Enter or Esc"),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Error "))
    .style(Style::default().fg(Color::Red))
    .wrap(Wrap { trim: true });
    f.render_widget(content, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
