//! Prompt composition
//!
//! Builds the single textual input handed to the generation client from the
//! fixed system instruction, the formatted history window, and the new user
//! message.

use crate::models::{ChatTurnMessage, MessageRole};

/// Format one history entry as `"<Role>: <content>"`.
fn format_entry(message: &ChatTurnMessage) -> String {
    let role = match message.role {
        MessageRole::User => "User",
        MessageRole::Assistant => "Assistant",
    };
    format!("{}: {}", role, message.content)
}

/// Compose the prompt for one generation call.
///
/// With history: `"<system>\n<formatted history>\nUser: <new message>"`.
/// With empty history the history line is omitted entirely, never left as a
/// blank line.
pub fn compose(
    system_instruction: &str,
    history: &[ChatTurnMessage],
    new_message: &str,
) -> String {
    if history.is_empty() {
        return format!("{}\nUser: {}", system_instruction, new_message);
    }

    let formatted: Vec<String> = history.iter().map(format_entry).collect();
    format!(
        "{}\n{}\nUser: {}",
        system_instruction,
        formatted.join("\n"),
        new_message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatTurnMessage;

    #[test]
    fn test_compose_with_history() {
        let history = vec![
            ChatTurnMessage::user("hi"),
            ChatTurnMessage::assistant("hello"),
        ];

        let prompt = compose("You are a tutor.", &history, "bye");
        assert_eq!(prompt, "You are a tutor.\nUser: hi\nAssistant: hello\nUser: bye");
        assert!(prompt.ends_with("User: hi\nAssistant: hello\nUser: bye"));
    }

    #[test]
    fn test_compose_empty_history_has_no_blank_line() {
        let prompt = compose("You are a tutor.", &[], "bye");
        assert_eq!(prompt, "You are a tutor.\nUser: bye");
        assert!(!prompt.contains("\n\n"));
    }

    #[test]
    fn test_history_entries_keep_order() {
        let history = vec![
            ChatTurnMessage::user("first"),
            ChatTurnMessage::assistant("second"),
            ChatTurnMessage::user("third"),
        ];

        let prompt = compose("sys", &history, "fourth");
        assert_eq!(
            prompt,
            "sys\nUser: first\nAssistant: second\nUser: third\nUser: fourth"
        );
    }
}
