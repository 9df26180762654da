//! Tools the model can call.

pub mod calculator;
pub mod filesystem;
pub mod models;
pub mod path_utils;
pub mod process;
pub mod shell;

pub use calculator::CalculatorTool;
pub use filesystem::{EditFileTool, ReadFileTool, WriteFileTool};
pub use models::ModelListTool;
pub use shell::{BashTool, ExecTool};

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use neoneo_config::Config;
use neoneo_provider::Tool;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::safety::{Denial, SafetyCategory};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Denied(#[from] Denial),

    #[error("Command execution timed out after {0} seconds")]
    TimedOut(u64),

    #[error("{0}")]
    Failed(String),

    #[error("Tool panicked: {0}")]
    Panicked(String),

    #[error("Cancelled before execution")]
    Cancelled,
}

impl ToolError {
    pub(crate) fn missing(param: &str) -> Self {
        ToolError::InvalidArguments(format!("Missing or invalid '{}' parameter", param))
    }
}

/// Result of one invocation; both variants become a tool turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(String),
    Failure(ToolError),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    /// Text fed back to the model.
    pub fn text(&self) -> String {
        match self {
            ToolOutcome::Success(content) => content.clone(),
            ToolOutcome::Failure(error) => error.to_string(),
        }
    }
}

#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    fn category(&self) -> SafetyCategory;

    /// Validate `args` and render the text the safety gate inspects.
    fn payload(&self, args: &Value) -> Result<String, ToolError>;

    /// Extra detail for the confirmation prompt.
    fn preview(&self, _args: &Value) -> Option<String> {
        None
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

type BoxedTool = Box<dyn ToolTrait>;

pub fn to_provider_tool(tool: &dyn ToolTrait) -> Tool {
    Tool::new(tool.name(), tool.description(), tool.parameters())
}

pub struct ToolRegistry {
    tools: BTreeMap<String, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Insert `tool`, replacing any tool already registered under its name.
    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Box::new(tool)).is_some() {
            debug!("tool '{}' replaced", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolTrait> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Schemas for every tool, ordered by name.
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|t| to_provider_tool(t.as_ref()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool. Errors and panics inside the tool become a failure outcome.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            warn!("model requested unknown tool '{}'", name);
            return ToolOutcome::Failure(ToolError::NotFound(name.to_string()));
        };

        debug!("invoking {} with {}", name, args);
        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(Ok(content)) => ToolOutcome::Success(content),
            Ok(Err(e)) => {
                debug!("{} failed: {}", name, e);
                ToolOutcome::Failure(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("{} panicked: {}", name, message);
                ToolOutcome::Failure(ToolError::Panicked(message))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Register the tool families switched on in `config`.
pub fn register_default_tools(registry: &mut ToolRegistry, config: &Config) {
    if config.enable_tools {
        registry.register(CalculatorTool::new());
    }

    if config.enable_shell {
        registry.register(ExecTool::new());
        registry.register(BashTool::new());
    }

    if config.enable_model_list {
        registry.register(ModelListTool::new(config.host.clone()));
    }

    if config.enable_file_ops {
        registry.register(ReadFileTool::new());
        registry.register(WriteFileTool::new());
        registry.register(EditFileTool::new());
    }

    info!("{} tools registered: {:?}", registry.len(), registry.names());
}

pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::missing(key))
}

/// Models sometimes send numbers as strings.
pub(crate) fn u64_arg(args: &Value, key: &str) -> Option<u64> {
    match args.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn i64_arg(args: &Value, key: &str) -> Option<i64> {
    match args.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Cut `text` to at most `max` bytes without splitting a character.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Shorten `text` for a confirmation prompt.
pub(crate) fn preview_text(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        format!("{}... (truncated)", truncate_chars(text, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        // 'é' is two bytes
        assert_eq!(truncate_chars("héllo", 2), "h");
    }

    #[test]
    fn test_preview_text() {
        assert_eq!(preview_text("short", 10), "short");
        assert_eq!(preview_text("abcdefghij", 4), "abcd... (truncated)");
    }

    #[test]
    fn test_numeric_args_accept_strings() {
        let args = json!({"a": 5, "b": "7", "c": 2.9, "d": -3, "e": "x"});
        assert_eq!(u64_arg(&args, "a"), Some(5));
        assert_eq!(u64_arg(&args, "b"), Some(7));
        assert_eq!(u64_arg(&args, "c"), Some(2));
        assert_eq!(u64_arg(&args, "d"), None);
        assert_eq!(u64_arg(&args, "e"), None);
        assert_eq!(u64_arg(&args, "missing"), None);
        assert_eq!(i64_arg(&args, "d"), Some(-3));
        assert_eq!(i64_arg(&args, "b"), Some(7));
    }

    #[test]
    fn test_str_arg_error_names_parameter() {
        let err = str_arg(&json!({"path": 3}), "path").unwrap_err();
        assert_eq!(err.to_string(), "Missing or invalid 'path' parameter");
        assert!(str_arg(&json!("raw string"), "path").is_err());
    }

    #[test]
    fn test_outcome_text() {
        assert_eq!(ToolOutcome::Success("4".to_string()).text(), "4");
        let failure = ToolOutcome::Failure(ToolError::NotFound("web_search".to_string()));
        assert!(!failure.is_success());
        assert_eq!(failure.text(), "Tool not found: web_search");
        assert_eq!(
            ToolOutcome::Failure(ToolError::TimedOut(5)).text(),
            "Command execution timed out after 5 seconds"
        );
    }
}
