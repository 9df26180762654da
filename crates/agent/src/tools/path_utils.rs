//! Path checks for the file tools.

use std::path::{Component, Path, PathBuf};

use neoneo_config::paths::expand_tilde;

use super::{str_arg, ToolError};

/// Reject any path that mentions `..`, before it touches the filesystem.
pub fn reject_traversal(path: &str) -> Result<(), ToolError> {
    let has_parent = path.contains("..")
        || Path::new(path)
            .components()
            .any(|c| matches!(c, Component::ParentDir));
    if has_parent {
        return Err(ToolError::InvalidArguments(
            "Path contains forbidden '..' sequence".to_string(),
        ));
    }
    Ok(())
}

/// Read the `path` argument, validate it and expand `~`.
pub fn path_arg(args: &serde_json::Value) -> Result<(String, PathBuf), ToolError> {
    let raw = str_arg(args, "path")?;
    if raw.trim().is_empty() {
        return Err(ToolError::missing("path"));
    }
    reject_traversal(raw)?;
    Ok((raw.to_string(), expand_tilde(raw)))
}
