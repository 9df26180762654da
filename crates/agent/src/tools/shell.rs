//! Shell command tools.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::process::{run_capped, CommandOutput};
use super::{str_arg, u64_arg, ToolError, ToolTrait};
use crate::safety::SafetyCategory;

const EXEC_MAX_OUTPUT: usize = 1000;
const BASH_MAX_OUTPUT: usize = 1_000_000;

fn timeout_arg(args: &Value, default: u64, max: u64) -> Duration {
    let secs = u64_arg(args, "timeout").unwrap_or(default).clamp(1, max);
    Duration::from_secs(secs)
}

/// Plain `sh -c` with a short leash.
pub struct ExecTool {
    default_timeout: u64,
    max_timeout: u64,
}

impl ExecTool {
    pub fn new() -> Self {
        Self {
            default_timeout: 5,
            max_timeout: 30,
        }
    }
}

impl Default for ExecTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTrait for ExecTool {
    fn name(&self) -> &str {
        "execute_shell_command"
    }
    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use for simple, read-only commands."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The shell command to execute" },
                "timeout": {
                    "type": "integer",
                    "description": "Maximum execution time in seconds (1-30). Defaults to 5."
                }
            },
            "required": ["command"]
        })
    }
    fn category(&self) -> SafetyCategory {
        SafetyCategory::Shell
    }
    fn payload(&self, args: &Value) -> Result<String, ToolError> {
        Ok(str_arg(args, "command")?.to_string())
    }
    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let command = str_arg(&args, "command")?;
        let timeout = timeout_arg(&args, self.default_timeout, self.max_timeout);

        debug!("execute_shell_command: {}", command);
        let output = run_capped("sh", command, timeout, EXEC_MAX_OUTPUT).await?;
        render(output, "\n... (output truncated)")
    }
}

/// `bash -c` with a working directory and a generous output ceiling.
pub struct BashTool {
    default_timeout: u64,
    max_timeout: u64,
}

impl BashTool {
    pub fn new() -> Self {
        Self {
            default_timeout: 10,
            max_timeout: 60,
        }
    }

    fn script(args: &Value) -> Result<String, ToolError> {
        let command = str_arg(args, "command")?;
        match args.get("working_directory").and_then(Value::as_str) {
            Some(dir) if !dir.is_empty() => Ok(format!("cd \"{}\" && {}", dir, command)),
            _ => Ok(command.to_string()),
        }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTrait for BashTool {
    fn name(&self) -> &str {
        "bash"
    }
    fn description(&self) -> &str {
        "Execute bash commands with full output. More capable than execute_shell_command: \
         supports pipes, redirection and a working directory."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The bash command to execute" },
                "timeout": {
                    "type": "integer",
                    "description": "Maximum execution time in seconds (1-60). Defaults to 10."
                },
                "working_directory": {
                    "type": "string",
                    "description": "Directory to run the command in. Defaults to the current directory."
                }
            },
            "required": ["command"]
        })
    }
    fn category(&self) -> SafetyCategory {
        SafetyCategory::Bash
    }
    /// The full script, including the `cd` prefix, is what runs and what is checked.
    fn payload(&self, args: &Value) -> Result<String, ToolError> {
        Self::script(args)
    }
    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let script = Self::script(&args)?;
        let timeout = timeout_arg(&args, self.default_timeout, self.max_timeout);

        debug!("bash: {}", script);
        let output = run_capped("bash", &script, timeout, BASH_MAX_OUTPUT).await?;
        render(output, "\n... (output truncated due to size limit)")
    }
}

/// Nonzero exit is a failure that still carries the output.
fn render(output: CommandOutput, truncation_notice: &str) -> Result<String, ToolError> {
    let mut text = output.text;
    if output.truncated {
        text.push_str(truncation_notice);
        return Ok(text);
    }

    match output.exit_code {
        Some(0) if text.is_empty() => Ok("Command executed successfully (no output)".to_string()),
        Some(0) => Ok(text),
        Some(code) if text.is_empty() => {
            Err(ToolError::Failed(format!("Command failed with exit code: {}", code)))
        }
        Some(code) => Err(ToolError::Failed(format!(
            "Command failed with exit code: {}\nOutput:\n{}",
            code, text
        ))),
        None => Err(ToolError::Failed(format!(
            "Command terminated by signal\nOutput:\n{}",
            text
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_arg_clamps() {
        let tool = ExecTool::new();
        let t = |args: Value| timeout_arg(&args, tool.default_timeout, tool.max_timeout);
        assert_eq!(t(json!({})), Duration::from_secs(5));
        assert_eq!(t(json!({"timeout": 0})), Duration::from_secs(1));
        assert_eq!(t(json!({"timeout": 300})), Duration::from_secs(30));
        assert_eq!(t(json!({"timeout": "12"})), Duration::from_secs(12));
    }

    #[test]
    fn test_bash_payload_includes_working_directory() {
        let tool = BashTool::new();
        let payload = tool
            .payload(&json!({"command": "ls", "working_directory": "/srv/app"}))
            .unwrap();
        assert_eq!(payload, "cd \"/srv/app\" && ls");
        assert_eq!(tool.payload(&json!({"command": "pwd"})).unwrap(), "pwd");
    }

    #[test]
    fn test_payload_requires_command() {
        let err = ExecTool::new().payload(&json!({"cmd": "ls"})).unwrap_err();
        assert_eq!(err.to_string(), "Missing or invalid 'command' parameter");
    }

    #[test]
    fn test_render_variants() {
        let out = |text: &str, truncated, exit_code| CommandOutput {
            text: text.to_string(),
            truncated,
            exit_code,
        };

        assert_eq!(
            render(out("", false, Some(0)), "").unwrap(),
            "Command executed successfully (no output)"
        );
        assert_eq!(render(out("hi\n", false, Some(0)), "").unwrap(), "hi\n");
        assert_eq!(
            render(out("abc", true, None), "\n... (output truncated)").unwrap(),
            "abc\n... (output truncated)"
        );
        assert_eq!(
            render(out("boom\n", false, Some(2)), "").unwrap_err().to_string(),
            "Command failed with exit code: 2\nOutput:\nboom\n"
        );
    }
}
