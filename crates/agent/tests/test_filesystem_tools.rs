//! Tests for file read, write and edit tools

use std::fs;

use neoneo_agent::tools::{EditFileTool, ReadFileTool, ToolTrait, WriteFileTool};
use neoneo_agent::SafetyCategory;
use serde_json::json;
use tempfile::TempDir;

fn path_str(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

// ========== Traversal Tests ==========

#[test]
fn test_traversal_rejected_in_payload() {
    let args = json!({"path": "../secret.txt", "content": "x", "append": "x"});

    let tools: Vec<Box<dyn ToolTrait>> = vec![
        Box::new(ReadFileTool::new()),
        Box::new(WriteFileTool::new()),
        Box::new(EditFileTool::new()),
    ];
    for tool in &tools {
        let err = tool.payload(&args).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Path contains forbidden '..' sequence",
            "{} accepted a traversal path",
            tool.name()
        );
    }
}

#[tokio::test]
async fn test_traversal_rejected_before_filesystem_access() {
    let dir = TempDir::new().unwrap();
    let target = format!("{}/sub/../escaped.txt", dir.path().display());

    let result = WriteFileTool::new()
        .execute(json!({"path": target, "content": "data"}))
        .await;
    assert!(result.is_err());
    assert!(!dir.path().join("escaped.txt").exists());
    assert!(!dir.path().join("sub").exists());
}

#[test]
fn test_categories() {
    assert_eq!(ReadFileTool::new().category(), SafetyCategory::ReadOnly);
    assert_eq!(WriteFileTool::new().category(), SafetyCategory::FileWrite);
    assert_eq!(EditFileTool::new().category(), SafetyCategory::FileEdit);
}

// ========== Read Tests ==========

#[tokio::test]
async fn test_read_file() {
    let dir = TempDir::new().unwrap();
    let path = path_str(&dir, "notes.txt");
    fs::write(&path, "line one\nline two\n").unwrap();

    let content = ReadFileTool::new()
        .execute(json!({"path": path}))
        .await
        .unwrap();
    assert_eq!(content, "line one\nline two\n");
}

#[tokio::test]
async fn test_read_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = path_str(&dir, "missing.txt");

    let err = ReadFileTool::new()
        .execute(json!({"path": path}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), format!("File does not exist: {}", path));
}

#[tokio::test]
async fn test_read_directory_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().to_string_lossy().into_owned();

    let err = ReadFileTool::new()
        .execute(json!({"path": path}))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Not a regular file"));
}

#[tokio::test]
async fn test_read_large_file_truncated() {
    let dir = TempDir::new().unwrap();
    let path = path_str(&dir, "big.txt");
    fs::write(&path, "a".repeat(60_000)).unwrap();

    let content = ReadFileTool::new()
        .execute(json!({"path": path}))
        .await
        .unwrap();
    assert!(content.ends_with("\n... (content truncated, file too large)"));
    assert!(content.starts_with(&"a".repeat(50_000)));
    assert!(!content.starts_with(&"a".repeat(50_001)));
}

// ========== Write Tests ==========

#[tokio::test]
async fn test_write_creates_parents() {
    let dir = TempDir::new().unwrap();
    let path = path_str(&dir, "a/b/c.txt");

    let result = WriteFileTool::new()
        .execute(json!({"path": path, "content": "hello"}))
        .await
        .unwrap();
    assert_eq!(
        result,
        format!("File successfully written: {} (5 bytes)", path)
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
}

#[tokio::test]
async fn test_write_requires_content() {
    let dir = TempDir::new().unwrap();
    let path = path_str(&dir, "x.txt");

    let err = WriteFileTool::new()
        .execute(json!({"path": path}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Missing or invalid 'content' parameter");
}

// ========== Edit Tests ==========

#[tokio::test]
async fn test_edit_replace_text() {
    let dir = TempDir::new().unwrap();
    let path = path_str(&dir, "config.ini");
    fs::write(&path, "debug=false\nport=80\n").unwrap();

    let result = EditFileTool::new()
        .execute(json!({"path": path, "old_text": "port=80", "new_text": "port=8080"}))
        .await
        .unwrap();
    assert_eq!(result, format!("File successfully edited: {}", path));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "debug=false\nport=8080\n"
    );
}

#[tokio::test]
async fn test_edit_append_prepend_insert() {
    let dir = TempDir::new().unwrap();
    let path = path_str(&dir, "list.txt");
    fs::write(&path, "b\n").unwrap();
    let tool = EditFileTool::new();

    tool.execute(json!({"path": path, "append": "c\n"}))
        .await
        .unwrap();
    tool.execute(json!({"path": path, "prepend": "a\n"}))
        .await
        .unwrap();
    tool.execute(json!({"path": path, "insert_at_line": 1, "text": "between"}))
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "a\nbetween\nb\nc\n");
}

#[tokio::test]
async fn test_edit_errors() {
    let dir = TempDir::new().unwrap();
    let path = path_str(&dir, "doc.txt");
    let tool = EditFileTool::new();

    let err = tool
        .execute(json!({"path": path, "append": "x"}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), format!("File does not exist: {}", path));

    fs::write(&path, "content").unwrap();
    let err = tool
        .execute(json!({"path": path, "old_text": "absent", "new_text": "x"}))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Could not find the text to replace in the file"
    );

    let err = tool.execute(json!({"path": path})).await.unwrap_err();
    assert!(err.to_string().starts_with("No valid edit operation specified"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "content");
}
