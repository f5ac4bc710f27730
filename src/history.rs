use crate::models::ChatMessage;

#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn truncate_to_last(&mut self, n: usize) {
        let excess = self.messages.len().saturating_sub(n);
        if excess > 0 {
            self.messages.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> ChatHistory {
        let mut history = ChatHistory::new();
        for i in 0..n {
            if i % 2 == 0 {
                history.push(ChatMessage::user(format!("q{i}")));
            } else {
                history.push(ChatMessage::assistant(format!("a{i}")));
            }
        }
        history
    }

    #[test]
    fn truncate_to_last_keeps_newest_messages() {
        let mut history = sample(5);
        history.truncate_to_last(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].content, "a3");

        let mut short = sample(1);
        short.truncate_to_last(2);
        assert_eq!(short.len(), 1);
    }

    #[test]
    fn clear_empties_history() {
        let mut history = sample(3);
        history.clear();
        assert!(history.is_empty());
    }
}
