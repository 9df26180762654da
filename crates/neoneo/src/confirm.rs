//! Single-keypress confirmation on the terminal.

use std::io;
use std::sync::Arc;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::Stylize;
use crossterm::terminal;
use neoneo_agent::{ConfirmRequest, Confirmer};
use tracing::warn;

use crate::console::{Console, Tone};

/// Enter confirms; any other key cancels.
///
/// The prompt and verdict go through the shared [`Console`] so they never
/// interleave with streamed model output.
pub struct TerminalConfirmer {
    console: Arc<Console>,
}

impl TerminalConfirmer {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }

    fn describe(request: &ConfirmRequest<'_>) -> String {
        let mut text = String::new();
        match request.matched_pattern {
            Some(pattern) => {
                text.push_str(&format!(
                    "{}\n",
                    format!(
                        "WARNING: {} matches the potentially dangerous pattern '{}'",
                        request.tool, pattern
                    )
                    .red()
                    .bold()
                ));
            }
            None => {
                text.push_str(&format!(
                    "{}\n",
                    format!("The model wants to run {} ({})", request.tool, request.category)
                        .yellow()
                ));
            }
        }
        text.push_str(&format!("  {}\n", request.payload));
        if let Some(preview) = request.preview {
            text.push_str(&format!("{}\n", preview));
        }
        text.push_str("Press Enter to confirm, any other key to cancel: ");
        text
    }

    fn announce(&self, request: &ConfirmRequest<'_>) {
        self.console.write(&format!("\n{}", Self::describe(request)));
    }

    fn report(&self, confirmed: bool) {
        if confirmed {
            self.console.print("confirmed", Tone::Success);
        } else {
            self.console.print("cancelled", Tone::Error);
        }
    }

    fn read_key() -> io::Result<bool> {
        terminal::enable_raw_mode()?;
        let answer = loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    break Ok(key.code == KeyCode::Enter)
                }
                Ok(_) => continue,
                Err(e) => break Err(e),
            }
        };
        terminal::disable_raw_mode()?;
        answer
    }
}

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, request: &ConfirmRequest<'_>) -> bool {
        self.announce(request);

        let answer = tokio::task::block_in_place(Self::read_key).unwrap_or_else(|e| {
            warn!("could not read confirmation key: {}", e);
            false
        });

        self.report(answer);
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::tests::Captured;
    use neoneo_agent::SafetyCategory;

    fn confirmer() -> (TerminalConfirmer, Captured) {
        let captured = Captured::default();
        let console = Arc::new(Console::with_writer(captured.clone()));
        (TerminalConfirmer::new(console), captured)
    }

    #[test]
    fn test_pattern_warning_goes_through_console() {
        let (confirmer, captured) = confirmer();
        confirmer.announce(&ConfirmRequest {
            tool: "execute_shell_command",
            category: SafetyCategory::Shell,
            payload: "rm -rf build",
            matched_pattern: Some("rm -rf"),
            preview: None,
        });

        let text = captured.text();
        assert!(text.contains("matches the potentially dangerous pattern 'rm -rf'"));
        assert!(text.contains("  rm -rf build\n"));
        assert!(text.ends_with("Press Enter to confirm, any other key to cancel: "));
    }

    #[test]
    fn test_generic_prompt_shows_preview() {
        let (confirmer, captured) = confirmer();
        confirmer.announce(&ConfirmRequest {
            tool: "write_file",
            category: SafetyCategory::FileWrite,
            payload: "notes.txt",
            matched_pattern: None,
            preview: Some("Content (preview):\nhello"),
        });

        let text = captured.text();
        assert!(text.contains("The model wants to run write_file (file write)"));
        assert!(text.contains("Content (preview):\nhello\n"));
    }

    #[test]
    fn test_verdict_goes_through_console() {
        let (confirmer, captured) = confirmer();
        confirmer.report(true);
        confirmer.report(false);

        let text = captured.text();
        let confirmed = text.find("confirmed").unwrap();
        let cancelled = text.find("cancelled").unwrap();
        assert!(confirmed < cancelled);
    }
}
