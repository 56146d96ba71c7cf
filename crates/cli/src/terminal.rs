//! Terminal adapters: stdin as a prompt source, stdout/stderr as output.
//!
//! Model text goes to stdout as it streams. Tool activity and errors go to
//! stderr, so piping `ferrule agent` captures only the conversation.

use async_trait::async_trait;
use ferrule_agent::{AgentStreamEvent, OutputSink, PromptSource};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

/// Longest tool input/output shown on the terminal.
const PREVIEW_CHARS: usize = 240;

/// Reads one line from stdin each time the session asks for input.
pub struct StdinPrompt {
    lines: Lines<BufReader<Stdin>>,
    prompt: String,
}

impl StdinPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl PromptSource for StdinPrompt {
    async fn next_line(&mut self) -> Option<String> {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}", self.prompt);
        let _ = stdout.flush();

        match self.lines.next_line().await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                let _ = writeln!(stdout);
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read input");
                None
            }
        }
    }
}

/// Renders agent events for a human.
pub struct TerminalSink<O: Write, E: Write> {
    out: O,
    diag: E,
    /// Content was streamed during the current turn
    streamed: bool,
    /// The last streamed chunk did not end a line
    line_open: bool,
}

impl TerminalSink<std::io::Stdout, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> TerminalSink<O, E> {
    pub fn new(out: O, diag: E) -> Self {
        Self {
            out,
            diag,
            streamed: false,
            line_open: false,
        }
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (O, E) {
        (self.out, self.diag)
    }

    fn close_line(&mut self) {
        if self.line_open {
            let _ = writeln!(self.out);
            self.line_open = false;
        }
    }

    fn render(&mut self, event: AgentStreamEvent) -> std::io::Result<()> {
        match event {
            AgentStreamEvent::Chunk { content } => {
                write!(self.out, "{content}")?;
                self.out.flush()?;
                self.streamed = true;
                self.line_open = !content.ends_with('\n');
            }
            AgentStreamEvent::ToolCall { name, input, .. } => {
                self.close_line();
                writeln!(self.diag, "  → {name} {}", preview(&input.to_string()))?;
            }
            AgentStreamEvent::ToolResult {
                name,
                output,
                success,
                ..
            } => {
                let status = if success { "ok" } else { "failed" };
                writeln!(self.diag, "  ← {name} {status}: {}", preview(&output))?;
            }
            AgentStreamEvent::ToolNameRejected { name, reason, .. } => {
                self.close_line();
                writeln!(self.diag, "  ✗ {name}: {reason}")?;
            }
            AgentStreamEvent::CallRepaired {
                name, dispatched, ..
            } => {
                self.close_line();
                let action = if dispatched { "running it" } else { "not running it" };
                writeln!(self.diag, "  ↺ read a {name} call from plain text, {action}")?;
            }
            AgentStreamEvent::Final { content } => {
                if self.streamed {
                    self.close_line();
                } else if !content.is_empty() {
                    writeln!(self.out, "{content}")?;
                }
                self.streamed = false;
                self.line_open = false;
                self.out.flush()?;
            }
            AgentStreamEvent::Notice { message } => {
                self.close_line();
                writeln!(self.out, "{message}")?;
            }
            AgentStreamEvent::Done {
                rounds,
                tool_calls_made,
                usage,
            } => {
                debug!(rounds, tool_calls_made, ?usage, "Turn finished");
            }
            AgentStreamEvent::Error { message } => {
                self.close_line();
                writeln!(self.diag, "{message}")?;
                // The same text arrives again as the final content.
                self.streamed = true;
            }
        }
        Ok(())
    }
}

impl<O: Write + Send, E: Write + Send> OutputSink for TerminalSink<O, E> {
    fn emit(&mut self, event: AgentStreamEvent) {
        if let Err(e) = self.render(event) {
            warn!(error = %e, "Failed to write to terminal");
        }
    }
}

/// One-line, length-capped rendering of tool text.
fn preview(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> TerminalSink<Vec<u8>, Vec<u8>> {
        TerminalSink::new(Vec::new(), Vec::new())
    }

    fn output(sink: TerminalSink<Vec<u8>, Vec<u8>>) -> (String, String) {
        let (out, diag) = sink.into_parts();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(diag).unwrap(),
        )
    }

    #[test]
    fn streamed_content_is_not_printed_twice() {
        let mut s = sink();
        s.emit(AgentStreamEvent::Chunk {
            content: "Hello ".into(),
        });
        s.emit(AgentStreamEvent::Chunk {
            content: "world".into(),
        });
        s.emit(AgentStreamEvent::Final {
            content: "Hello world".into(),
        });
        let (out, _) = output(s);
        assert_eq!(out, "Hello world\n");
    }

    #[test]
    fn unstreamed_final_is_printed() {
        let mut s = sink();
        s.emit(AgentStreamEvent::Final {
            content: "Done.".into(),
        });
        let (out, _) = output(s);
        assert_eq!(out, "Done.\n");
    }

    #[test]
    fn tool_activity_goes_to_diagnostics() {
        let mut s = sink();
        s.emit(AgentStreamEvent::Chunk {
            content: "Let me look".into(),
        });
        s.emit(AgentStreamEvent::ToolCall {
            id: "c1".into(),
            name: "fileSystemTool".into(),
            input: serde_json::json!({"operation": "read"}),
        });
        s.emit(AgentStreamEvent::ToolResult {
            id: "c1".into(),
            name: "fileSystemTool".into(),
            output: "File content: a\nb".into(),
            success: true,
        });
        let (out, diag) = output(s);
        assert_eq!(out, "Let me look\n");
        assert!(diag.contains("→ fileSystemTool"));
        assert!(diag.contains("← fileSystemTool ok: File content: a b"));
    }

    #[test]
    fn error_is_reported_once() {
        let mut s = sink();
        s.emit(AgentStreamEvent::Error {
            message: "Error: boom".into(),
        });
        s.emit(AgentStreamEvent::Final {
            content: "Error: boom".into(),
        });
        let (out, diag) = output(s);
        assert!(out.is_empty());
        assert_eq!(diag, "Error: boom\n");
    }

    #[test]
    fn preview_caps_length() {
        let long = "x".repeat(PREVIEW_CHARS + 10);
        let shown = preview(&long);
        assert!(shown.ends_with('…'));
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 1);
        assert_eq!(preview("a\nb"), "a b");
    }
}
