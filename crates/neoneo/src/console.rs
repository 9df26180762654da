//! Terminal output for the REPL.

use std::io::{self, Write};
use std::sync::Mutex;

use crossterm::style::{Color, Stylize};
use neoneo_agent::{ToolObserver, ToolOutcome};
use neoneo_provider::{StreamSink, ToolCall};

const RESULT_PREVIEW: usize = 400;

#[derive(Debug, Clone, Copy)]
pub enum Tone {
    Normal,
    Header,
    System,
    Success,
    Warning,
    Error,
    Tool,
}

impl Tone {
    fn color(self) -> Option<Color> {
        match self {
            Tone::Normal => None,
            Tone::Header => Some(Color::Magenta),
            Tone::System => Some(Color::Blue),
            Tone::Success => Some(Color::Green),
            Tone::Warning => Some(Color::Yellow),
            Tone::Error => Some(Color::Red),
            Tone::Tool => Some(Color::Cyan),
        }
    }
}

/// Serializes terminal writes; the lock is held per chunk, not per turn.
pub struct Console {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(Box::new(io::stdout())),
        }
    }

    #[cfg(test)]
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }

    /// Write `text` as-is.
    pub fn write(&self, text: &str) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    pub fn print(&self, text: &str, tone: Tone) {
        let line = match tone.color() {
            Some(color) => format!("{}\n", text.with(color)),
            None => format!("{}\n", text),
        };
        self.write(&line);
    }

    pub fn prompt(&self) {
        self.write(&format!("\n{} ", ">".green().bold()));
    }

    /// End the streamed reply line.
    pub fn end_reply(&self) {
        self.write("\n");
    }

    pub fn rule(&self) {
        self.print(&"-".repeat(50), Tone::Normal);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSink for Console {
    fn on_text(&self, delta: &str) {
        self.write(delta);
    }

    fn on_decode_error(&self, _line: &str, error: &str) {
        self.print(
            &format!("\n[skipped malformed response line: {}]", error),
            Tone::Warning,
        );
    }
}

impl ToolObserver for Console {
    fn on_tool_call(&self, call: &ToolCall) {
        self.print(
            &format!("\n[tool] {} {}", call.name, call.arguments),
            Tone::Tool,
        );
    }

    fn on_tool_outcome(&self, call: &ToolCall, outcome: &ToolOutcome) {
        let text = outcome.text();
        let shown = match text.char_indices().nth(RESULT_PREVIEW) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text,
        };
        match outcome {
            ToolOutcome::Success(_) => {
                self.print(&format!("[{} ok]\n{}", call.name, shown), Tone::Success)
            }
            ToolOutcome::Failure(_) => {
                self.print(&format!("[{} failed] {}", call.name, shown), Tone::Error)
            }
        }
    }

    fn on_followup(&self) {
        self.write("\n");
    }
}
