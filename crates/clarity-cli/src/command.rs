//! Input line parsing.

/// What the user asked for with one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send the line as a chat message, untrimmed.
    Send(String),
    /// Clear the conversation.
    Reset,
    /// Stop the reply in flight.
    Stop,
    /// Print the command summary.
    Help,
    /// Exit.
    Quit,
}

/// Summary printed at startup and for `/help`.
pub const HELP: &str = "Type a message and press Enter. Commands: /reset, /stop, /help, /quit";

impl Command {
    /// Parse one line of input. Blank lines yield `None`.
    ///
    /// Unknown `/` words are sent as ordinary messages.
    pub fn parse(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }
        let command = match line.trim() {
            "/reset" | "/clear" => Self::Reset,
            "/stop" => Self::Stop,
            "/help" | "/?" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            _ => Self::Send(line.to_string()),
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("   \t"), None);
    }

    #[test]
    fn commands_are_recognised() {
        assert_eq!(Command::parse("/reset"), Some(Command::Reset));
        assert_eq!(Command::parse(" /stop "), Some(Command::Stop));
        assert_eq!(Command::parse("/quit"), Some(Command::Quit));
        assert_eq!(Command::parse("/exit"), Some(Command::Quit));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
    }

    #[test]
    fn messages_keep_their_whitespace() {
        assert_eq!(
            Command::parse("  what is 2+2? "),
            Some(Command::Send("  what is 2+2? ".to_string()))
        );
        assert_eq!(
            Command::parse("/shrug"),
            Some(Command::Send("/shrug".to_string()))
        );
    }
}
