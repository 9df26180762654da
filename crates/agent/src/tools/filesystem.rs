//! File read, write and edit tools.
//!
//! Paths are validated in `payload`, so a `..` path is refused before the
//! safety gate runs and before anything touches the disk.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::path_utils::path_arg;
use super::{i64_arg, preview_text, str_arg, truncate_chars, ToolError, ToolTrait};
use crate::safety::SafetyCategory;

const READ_MAX_BYTES: usize = 50_000;
const WRITE_PREVIEW: usize = 200;
const EDIT_PREVIEW: usize = 100;

fn io_error(action: &str, path: &str, e: std::io::Error) -> ToolError {
    ToolError::Failed(format!("Error {} file {}: {}", action, path, e))
}

pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTrait for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read the contents of a file"
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string", "description": "Path of the file to read" } },
            "required": ["path"]
        })
    }
    fn category(&self) -> SafetyCategory {
        SafetyCategory::ReadOnly
    }
    fn payload(&self, args: &Value) -> Result<String, ToolError> {
        Ok(path_arg(args)?.0)
    }
    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let (raw, path) = path_arg(&args)?;

        debug!("read_file: {:?}", path);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| ToolError::Failed(format!("File does not exist: {}", raw)))?;
        if !metadata.is_file() {
            return Err(ToolError::Failed(format!("Not a regular file: {}", raw)));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| io_error("reading", &raw, e))?;
        let content = String::from_utf8_lossy(&bytes);
        if content.len() > READ_MAX_BYTES {
            return Ok(format!(
                "{}\n... (content truncated, file too large)",
                truncate_chars(&content, READ_MAX_BYTES)
            ));
        }
        Ok(content.into_owned())
    }
}

pub struct WriteFileTool;

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTrait for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Write content to a file, creating parent directories if needed. Overwrites existing files."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path of the file to write" },
                "content": { "type": "string", "description": "Content to write" }
            },
            "required": ["path", "content"]
        })
    }
    fn category(&self) -> SafetyCategory {
        SafetyCategory::FileWrite
    }
    fn payload(&self, args: &Value) -> Result<String, ToolError> {
        let (raw, _) = path_arg(args)?;
        str_arg(args, "content")?;
        Ok(raw)
    }
    fn preview(&self, args: &Value) -> Option<String> {
        let content = args.get("content")?.as_str()?;
        Some(format!(
            "Content (preview):\n{}",
            preview_text(content, WRITE_PREVIEW)
        ))
    }
    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let (raw, path) = path_arg(&args)?;
        let content = str_arg(&args, "content")?;

        debug!("write_file: {:?} ({} bytes)", path, content.len());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("writing", &raw, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error("writing", &raw, e))?;

        Ok(format!(
            "File successfully written: {} ({} bytes)",
            raw,
            content.len()
        ))
    }
}

/// One edit, chosen by which arguments are present.
#[derive(Debug, Clone, PartialEq)]
enum EditOp {
    ReplaceAll(String),
    Replace { old: String, new: String },
    Append(String),
    Prepend(String),
    InsertAtLine { line: i64, text: String },
}

impl EditOp {
    fn parse(args: &Value) -> Result<Self, ToolError> {
        let text = |key: &str| args.get(key).and_then(Value::as_str).map(str::to_string);

        if let Some(content) = text("replace_all") {
            return Ok(EditOp::ReplaceAll(content));
        }
        if let (Some(old), Some(new)) = (text("old_text"), text("new_text")) {
            return Ok(EditOp::Replace { old, new });
        }
        if let Some(content) = text("append") {
            return Ok(EditOp::Append(content));
        }
        if let Some(content) = text("prepend") {
            return Ok(EditOp::Prepend(content));
        }
        if let (Some(line), Some(content)) = (i64_arg(args, "insert_at_line"), text("text")) {
            return Ok(EditOp::InsertAtLine {
                line,
                text: content,
            });
        }
        Err(ToolError::InvalidArguments(
            "No valid edit operation specified. Use 'replace_all', 'old_text'+'new_text', \
             'append', 'prepend', or 'insert_at_line'+'text'"
                .to_string(),
        ))
    }

    fn describe(&self) -> String {
        match self {
            EditOp::ReplaceAll(content) => format!(
                "Replace entire file\nNew Content: {}",
                preview_text(content, EDIT_PREVIEW)
            ),
            EditOp::Replace { old, new } => format!(
                "Replace text\nOld Text: {}\nNew Text: {}",
                preview_text(old, EDIT_PREVIEW),
                preview_text(new, EDIT_PREVIEW)
            ),
            EditOp::Append(content) => format!(
                "Append to file\nNew Content: {}",
                preview_text(content, EDIT_PREVIEW)
            ),
            EditOp::Prepend(content) => format!(
                "Prepend to file\nNew Content: {}",
                preview_text(content, EDIT_PREVIEW)
            ),
            EditOp::InsertAtLine { line, text } => format!(
                "Insert at line {}\nNew Content: {}",
                line,
                preview_text(text, EDIT_PREVIEW)
            ),
        }
    }

    fn apply(&self, content: &str) -> Result<String, ToolError> {
        let edited = match self {
            EditOp::ReplaceAll(new) => new.clone(),
            EditOp::Replace { old, new } => {
                if old.is_empty() || !content.contains(old.as_str()) {
                    return Err(ToolError::Failed(
                        "Could not find the text to replace in the file".to_string(),
                    ));
                }
                content.replacen(old.as_str(), new, 1)
            }
            EditOp::Append(extra) => format!("{}{}", content, extra),
            EditOp::Prepend(extra) => format!("{}{}", extra, content),
            EditOp::InsertAtLine { line, text } => {
                let mut lines: Vec<&str> = content.lines().collect();
                let at = (*line).clamp(0, lines.len() as i64) as usize;
                lines.insert(at, text);
                let mut joined = lines.join("\n");
                if content.ends_with('\n') {
                    joined.push('\n');
                }
                joined
            }
        };
        Ok(edited)
    }
}

pub struct EditFileTool;

impl EditFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTrait for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }
    fn description(&self) -> &str {
        "Edit an existing file: replace its contents, replace one occurrence of old_text with \
         new_text, append, prepend, or insert a line at a 0-based line number."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path of the file to edit" },
                "replace_all": { "type": "string", "description": "New content for the whole file" },
                "old_text": { "type": "string", "description": "Text to replace (first occurrence)" },
                "new_text": { "type": "string", "description": "Replacement for old_text" },
                "append": { "type": "string", "description": "Text to add at the end" },
                "prepend": { "type": "string", "description": "Text to add at the start" },
                "insert_at_line": { "type": "integer", "description": "0-based line to insert before" },
                "text": { "type": "string", "description": "Line to insert with insert_at_line" }
            },
            "required": ["path"]
        })
    }
    fn category(&self) -> SafetyCategory {
        SafetyCategory::FileEdit
    }
    fn payload(&self, args: &Value) -> Result<String, ToolError> {
        let (raw, _) = path_arg(args)?;
        EditOp::parse(args)?;
        Ok(raw)
    }
    fn preview(&self, args: &Value) -> Option<String> {
        EditOp::parse(args).ok().map(|op| op.describe())
    }
    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let (raw, path) = path_arg(&args)?;
        let op = EditOp::parse(&args)?;

        if !path.is_file() {
            return Err(ToolError::Failed(format!("File does not exist: {}", raw)));
        }

        debug!("edit_file: {:?} {:?}", path, op);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error("reading", &raw, e))?;
        let edited = op.apply(&content)?;
        tokio::fs::write(&path, edited)
            .await
            .map_err(|e| io_error("writing", &raw, e))?;

        Ok(format!("File successfully edited: {}", raw))
    }
}
