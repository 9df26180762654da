//! Model listing tool.

use async_trait::async_trait;
use neoneo_provider::{OllamaProvider, Provider};
use serde_json::{json, Value};
use tracing::warn;

use super::{ToolError, ToolTrait};
use crate::safety::SafetyCategory;

pub struct ModelListTool {
    host: String,
}

impl ModelListTool {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait]
impl ToolTrait for ModelListTool {
    fn name(&self) -> &str {
        "list_models"
    }
    fn description(&self) -> &str {
        "List the models available on an Ollama server"
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "host": {
                    "type": "string",
                    "description": "Ollama server URL. Defaults to the configured host."
                }
            },
            "required": []
        })
    }
    fn category(&self) -> SafetyCategory {
        SafetyCategory::ReadOnly
    }
    fn payload(&self, args: &Value) -> Result<String, ToolError> {
        Ok(self.target(args).to_string())
    }
    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let host = self.target(&args).to_string();
        let provider = OllamaProvider::new(host.as_str(), "");

        let models = provider.list_models().await.map_err(|e| {
            warn!("listing models at {} failed: {}", host, e);
            ToolError::Failed(format!("Could not connect to Ollama server at {}", host))
        })?;

        if models.is_empty() {
            return Ok(format!("No models found on Ollama server at {}", host));
        }

        let mut text = format!("Available models on Ollama server at {}:\n", host);
        for (i, model) in models.iter().enumerate() {
            text.push_str(&format!("  {}. {}\n", i + 1, model.name));
        }
        Ok(text)
    }
}

impl ModelListTool {
    fn target<'a>(&'a self, args: &'a Value) -> &'a str {
        args.get("host")
            .and_then(Value::as_str)
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(&self.host)
    }
}
