//! Line-oriented rendering of the conversation.
//!
//! The renderer turns [`HistoryEvent`]s into terminal output. A streamed reply
//! stays on one line that grows as tokens arrive; the line is closed when the
//! next message starts or the send finishes.

use std::io::{self, Write};

use clarity_client::SendOutcome;
use clarity_core::{Message, Role};
use clarity_store::HistoryEvent;

const RESET_BANNER: &str = "--- conversation reset ---";

fn prefix(role: Role) -> &'static str {
    match role {
        Role::User => "you: ",
        Role::Assistant => "coach: ",
    }
}

/// Writes conversation output to `W`.
pub struct Renderer<W: Write> {
    out: W,
    /// Index of the reply currently being streamed onto an open line.
    streaming: Option<usize>,
    /// Progress dots printed while waiting for the first token.
    dots: usize,
}

impl<W: Write> Renderer<W> {
    /// Create a renderer writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            streaming: None,
            dots: 0,
        }
    }

    /// Consume the renderer and return the writer.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print a full history, one message per line.
    ///
    /// Closes any open reply line first, so this also redraws from a snapshot
    /// after missed events. User messages are included since the terminal did
    /// not echo them.
    pub fn render_all(&mut self, messages: &[Message]) -> io::Result<()> {
        self.end_reply()?;
        for message in messages {
            writeln!(self.out, "{}{}", prefix(message.role), message.content)?;
        }
        self.out.flush()
    }

    /// Apply one history change.
    pub fn apply(&mut self, event: &HistoryEvent) -> io::Result<()> {
        match event {
            HistoryEvent::Appended { index, message } => {
                self.end_reply()?;
                // Typed lines are already on screen.
                if message.is_user() {
                    return Ok(());
                }
                write!(self.out, "{}{}", prefix(message.role), message.content)?;
                if message.content.is_empty() {
                    self.streaming = Some(*index);
                } else {
                    writeln!(self.out)?;
                }
            }
            HistoryEvent::Extended { index, delta } => {
                if self.streaming == Some(*index) {
                    if self.dots > 0 && !delta.is_empty() {
                        self.dots = 0;
                        write!(self.out, " ")?;
                    }
                    write!(self.out, "{delta}")?;
                }
            }
            HistoryEvent::Replaced { messages } => {
                self.end_reply()?;
                writeln!(self.out, "{RESET_BANNER}")?;
                self.render_all(messages)?;
            }
        }
        self.out.flush()
    }

    /// Report how a send ended.
    pub fn outcome(&mut self, outcome: &SendOutcome) -> io::Result<()> {
        self.end_reply()?;
        match outcome {
            SendOutcome::Ignored => {
                writeln!(self.out, "(still replying; /stop to interrupt)")?;
            }
            SendOutcome::EndedWithoutDone => writeln!(self.out, "(reply ended early)")?,
            SendOutcome::Cancelled => writeln!(self.out, "(stopped)")?,
            // Failures are already in the history as an error message.
            SendOutcome::Completed | SendOutcome::Superseded | SendOutcome::Failed(_) => {}
        }
        self.out.flush()
    }

    /// Show progress on the open reply line while no token has arrived.
    pub fn waiting(&mut self) -> io::Result<()> {
        if self.streaming.is_some() {
            self.dots += 1;
            write!(self.out, ".")?;
            self.out.flush()?;
        }
        Ok(())
    }

    /// Close the open reply line, if any.
    pub fn end_reply(&mut self) -> io::Result<()> {
        self.dots = 0;
        if self.streaming.take().is_some() {
            writeln!(self.out)?;
        }
        Ok(())
    }
}
