//! Bounded history window
//!
//! An ordered list of past turns capped at a fixed length. Trimming always
//! drops from the oldest end, so the window holds the most recent entries
//! in chronological order.

use crate::models::ChatTurnMessage;
use std::collections::VecDeque;

/// A capped, ordered view of a session's recent messages.
///
/// Invariant: `len() <= cap` after any mutation. Pairs of (user, assistant)
/// turns are not guaranteed to stay aligned when the cap is odd; that is
/// accepted boundary behavior, not a guarantee.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    cap: usize,
    messages: VecDeque<ChatTurnMessage>,
}

impl HistoryWindow {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            messages: VecDeque::new(),
        }
    }

    /// Build a window from already-ordered messages, trimming to the cap.
    pub fn from_messages(cap: usize, messages: Vec<ChatTurnMessage>) -> Self {
        let mut window = Self::new(cap);
        for msg in messages {
            window.push(msg);
        }
        window
    }

    /// Append a message, then trim from the front until within the cap.
    pub fn push(&mut self, message: ChatTurnMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.cap {
            self.messages.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Oldest-first iteration over the window.
    pub fn messages(&self) -> impl Iterator<Item = &ChatTurnMessage> {
        self.messages.iter()
    }

    /// Snapshot the window as an owned, oldest-first vector.
    pub fn to_vec(&self) -> Vec<ChatTurnMessage> {
        self.messages.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatTurnMessage;

    #[test]
    fn test_push_within_cap() {
        let mut window = HistoryWindow::new(5);
        window.push(ChatTurnMessage::user("hi"));
        window.push(ChatTurnMessage::assistant("hello"));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_cap_keeps_most_recent_oldest_first() {
        let mut window = HistoryWindow::new(20);
        for i in 0..25 {
            window.push(ChatTurnMessage::user(format!("message {}", i)));
        }

        assert_eq!(window.len(), 20);
        let contents: Vec<&str> = window.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[0], "message 5");
        assert_eq!(contents[19], "message 24");
    }

    #[test]
    fn test_invariant_holds_after_every_push() {
        let mut window = HistoryWindow::new(3);
        for i in 0..10 {
            window.push(ChatTurnMessage::user(format!("m{}", i)));
            assert!(window.len() <= window.cap());
        }
    }

    #[test]
    fn test_from_messages_trims() {
        let messages: Vec<_> = (0..7)
            .map(|i| ChatTurnMessage::user(format!("m{}", i)))
            .collect();
        let window = HistoryWindow::from_messages(4, messages);
        assert_eq!(window.len(), 4);
        assert_eq!(window.messages().next().unwrap().content, "m3");
    }
}
