//! Common test utilities for neoneo integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Nothing listens on the discard port.
pub const UNREACHABLE_HOST: &str = "http://127.0.0.1:9";

/// Path to the neoneo binary
pub fn bin_path() -> PathBuf {
    env!("CARGO_BIN_EXE_neoneo").into()
}

pub fn neoneo() -> Command {
    Command::new(env!("CARGO_BIN_EXE_neoneo"))
}

/// Isolated home directory so the default config path never hits the real one
pub struct TestEnv {
    pub temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            temp_dir: tempdir()?,
        })
    }

    pub fn home(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Where the binary looks for its config under this home
    pub fn default_config(&self) -> PathBuf {
        self.home().join(".config").join("neoneo").join("config.json")
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.home().join(name)
    }

    pub fn read_config(&self, path: &Path) -> anyhow::Result<serde_json::Value> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
