//! Interactive driver: reads human input and runs turns until the session ends.
//!
//! Input is pulled one line at a time, only when the session is waiting for
//! a human, so nothing reads stdin while the model or a tool is working.
//! A few inputs are handled locally and never reach the model: `exit` /
//! `quit` / `terminate`, `cd <path>`, and blank lines.

use crate::orchestrator::TurnOrchestrator;
use crate::session::{Session, TERMINATION_KEYWORD};
use crate::stream_event::{AgentStreamEvent, OutputSink};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

/// A source of human input lines.
#[async_trait]
pub trait PromptSource: Send {
    /// The next line, or `None` once input is exhausted.
    async fn next_line(&mut self) -> Option<String>;
}

/// Replays a fixed list of lines. Handy for scripts and tests.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: std::collections::VecDeque<String>,
    reads: usize,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            reads: 0,
        }
    }

    /// How many times a line was requested.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[async_trait]
impl PromptSource for ScriptedInput {
    async fn next_line(&mut self) -> Option<String> {
        self.reads += 1;
        self.lines.pop_front()
    }
}

/// What a raw input line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanInput {
    /// End the session now
    Exit,
    /// Change the working directory; `None` means the home directory
    ChangeDir(Option<String>),
    /// Nothing to do
    Blank,
    /// A prompt for the model
    Prompt(String),
}

/// Classify one line of human input.
pub fn classify(line: &str) -> HumanInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return HumanInput::Blank;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower == "exit" || lower == "quit" || trimmed.eq_ignore_ascii_case(TERMINATION_KEYWORD) {
        return HumanInput::Exit;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    if parts.next().is_some_and(|word| word.eq_ignore_ascii_case("cd")) {
        let target = parts.next().map(str::trim).filter(|t| !t.is_empty());
        return HumanInput::ChangeDir(target.map(String::from));
    }

    HumanInput::Prompt(trimmed.to_string())
}

/// Resolve a `cd` target against the current directory. `~` expands to home.
fn cd_target(target: Option<&str>) -> PathBuf {
    let home = ferrule_config::dirs_home();
    match target {
        None | Some("~") => home,
        Some(t) => match t.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(t),
        },
    }
}

/// Change the process working directory, returning the new directory.
pub fn change_dir(target: Option<&str>) -> Result<PathBuf, String> {
    let path = cd_target(target);
    std::env::set_current_dir(&path).map_err(|e| format!("cd: {}: {e}", path.display()))?;
    std::env::current_dir().map_err(|e| format!("cd: {e}"))
}

/// Prefix a prompt with the current working directory.
pub fn with_cwd(prompt: &str) -> String {
    match std::env::current_dir() {
        Ok(cwd) => format!("[cwd: {}] {prompt}", cwd.display()),
        Err(_) => prompt.to_string(),
    }
}

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The session terminated (keyword or single-shot input mode)
    SessionTerminated,
    /// The human typed an exit word
    UserExit,
    /// Input ran out
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub turns: u32,
    pub reason: StopReason,
}

/// Ties human input to the orchestrator.
pub struct AgentRunner {
    orchestrator: TurnOrchestrator,
    prefix_cwd: bool,
}

impl AgentRunner {
    pub fn new(orchestrator: TurnOrchestrator) -> Self {
        Self {
            orchestrator,
            prefix_cwd: true,
        }
    }

    /// Whether prompts carry a `[cwd: <dir>]` prefix.
    pub fn with_prefix_cwd(mut self, enabled: bool) -> Self {
        self.prefix_cwd = enabled;
        self
    }

    pub fn orchestrator(&self) -> &TurnOrchestrator {
        &self.orchestrator
    }

    /// Run until the session terminates, the human exits, or input runs out.
    ///
    /// `initial` is handled exactly like a typed line before any input is read.
    pub async fn run(
        &self,
        session: &mut Session,
        initial: Option<String>,
        input: &mut dyn PromptSource,
        sink: &mut dyn OutputSink,
    ) -> RunSummary {
        let mut pending = initial;
        let mut turns = 0;

        let reason = loop {
            if session.is_terminated() {
                break StopReason::SessionTerminated;
            }

            let line = match pending.take() {
                Some(line) => line,
                None => match input.next_line().await {
                    Some(line) => line,
                    None => break StopReason::EndOfInput,
                },
            };

            match classify(&line) {
                HumanInput::Blank => continue,
                HumanInput::Exit => {
                    info!(session_id = %session.id(), "Exit requested");
                    session.terminate();
                    break StopReason::UserExit;
                }
                HumanInput::ChangeDir(target) => {
                    let message = match change_dir(target.as_deref()) {
                        Ok(dir) => {
                            debug!(cwd = %dir.display(), "Working directory changed");
                            format!("Changed directory to {}", dir.display())
                        }
                        Err(e) => e,
                    };
                    sink.emit(AgentStreamEvent::Notice { message });
                }
                HumanInput::Prompt(text) => {
                    let prompt = if self.prefix_cwd { with_cwd(&text) } else { text };
                    self.orchestrator.run_turn(session, &prompt, sink).await;
                    turns += 1;
                }
            }
        };

        info!(session_id = %session.id(), turns, ?reason, "Session loop finished");
        RunSummary { turns, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_reserved_words() {
        assert_eq!(classify("exit"), HumanInput::Exit);
        assert_eq!(classify("  QUIT "), HumanInput::Exit);
        assert_eq!(classify("Terminate"), HumanInput::Exit);
        assert_eq!(classify(""), HumanInput::Blank);
        assert_eq!(classify("   "), HumanInput::Blank);
    }

    #[test]
    fn classify_cd() {
        assert_eq!(classify("cd"), HumanInput::ChangeDir(None));
        assert_eq!(classify("cd  /tmp "), HumanInput::ChangeDir(Some("/tmp".into())));
        assert_eq!(
            classify("cdrom is not a command"),
            HumanInput::Prompt("cdrom is not a command".into())
        );
    }

    #[test]
    fn classify_cd_any_case_and_whitespace() {
        assert_eq!(classify("CD /tmp"), HumanInput::ChangeDir(Some("/tmp".into())));
        assert_eq!(classify("cd\t/tmp"), HumanInput::ChangeDir(Some("/tmp".into())));
        assert_eq!(classify("Cd"), HumanInput::ChangeDir(None));
        assert_eq!(
            classify("cd ~/My Projects"),
            HumanInput::ChangeDir(Some("~/My Projects".into()))
        );
    }

    #[test]
    fn classify_prompt() {
        assert_eq!(
            classify("exit the vim editor how?"),
            HumanInput::Prompt("exit the vim editor how?".into())
        );
    }

    #[test]
    fn cd_target_expands_home() {
        let home = ferrule_config::dirs_home();
        assert_eq!(cd_target(None), home);
        assert_eq!(cd_target(Some("~")), home);
        assert_eq!(cd_target(Some("~/src")), home.join("src"));
        assert_eq!(cd_target(Some("/tmp")), PathBuf::from("/tmp"));
    }

    #[test]
    fn change_dir_reports_failure() {
        let err = change_dir(Some("/definitely/not/a/real/dir")).unwrap_err();
        assert!(err.starts_with("cd: "));
    }

    #[tokio::test]
    async fn scripted_input_counts_reads() {
        let mut input = ScriptedInput::new(["a"]);
        assert_eq!(input.next_line().await.as_deref(), Some("a"));
        assert_eq!(input.next_line().await, None);
        assert_eq!(input.reads(), 2);
    }
}
