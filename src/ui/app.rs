use crate::session::DisplayEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Confirm(ConfirmAction),
    Tips,
    ErrorDialog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    Quit,
    ClearConversation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    None,
    Warning(String),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub running: bool,
    pub status: String,
    pub screen: Screen,
    pub previous_screen: Screen,
    pub input: String,
    pub pending_input: Option<String>,
    pub notice: Notice,
    pub scroll_from_bottom: u16,
    pub confirm_selected: usize,
    pub compact_mode: bool,
    pub error_message: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            running: true,
            status: "ready".into(),
            screen: Screen::Chat,
            previous_screen: Screen::Chat,
            input: String::new(),
            pending_input: None,
            notice: Notice::None,
            scroll_from_bottom: 0,
            confirm_selected: 0,
            compact_mode: false,
            error_message: String::new(),
        }
    }
}

impl AppState {
    pub fn apply_events(&mut self, events: &[DisplayEvent]) {
        self.pending_input = None;
        self.notice = Notice::None;
        for event in events {
            match event {
                DisplayEvent::InputRejected { reason } => {
                    self.notice = Notice::Warning(format!("Not sent: {reason}"));
                    self.status = "message rejected".into();
                }
                DisplayEvent::SendDenied { message, .. } => {
                    self.notice = Notice::Warning(format!("Not sent: {message}"));
                    self.status = "usage limit".into();
                }
                DisplayEvent::AssistantMessage { .. } => {
                    self.input.clear();
                    self.scroll_from_bottom = 0;
                    self.status = "ok".into();
                }
                DisplayEvent::UserMessage { .. } | DisplayEvent::UsageUpdated { .. } => {}
            }
        }
    }

    pub fn open_confirm(&mut self, action: ConfirmAction) {
        self.previous_screen = self.screen.clone();
        self.screen = Screen::Confirm(action);
        self.confirm_selected = 0;
    }

    pub fn show_error(&mut self, message: String) {
        self.error_message = message;
        self.previous_screen = self.screen.clone();
        self.screen = Screen::ErrorDialog;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_reply_clears_input_and_notice() {
        let mut state = AppState {
            input: "hello".into(),
            pending_input: Some("hello".into()),
            notice: Notice::Warning("old".into()),
            scroll_from_bottom: 4,
            ..AppState::default()
        };
        state.apply_events(&[
            DisplayEvent::UserMessage {
                content: "hello".into(),
            },
            DisplayEvent::AssistantMessage {
                content: "hi".into(),
            },
        ]);
        assert!(state.input.is_empty());
        assert!(state.pending_input.is_none());
        assert_eq!(state.notice, Notice::None);
        assert_eq!(state.scroll_from_bottom, 0);
    }

    #[test]
    fn refused_send_keeps_input_for_editing() {
        let mut state = AppState {
            input: "too long".into(),
            ..AppState::default()
        };
        state.apply_events(&[DisplayEvent::InputRejected {
            reason: "message too long (9/8 characters)".into(),
        }]);
        assert_eq!(state.input, "too long");
        assert_eq!(
            state.notice,
            Notice::Warning("Not sent: message too long (9/8 characters)".into())
        );
    }
}
