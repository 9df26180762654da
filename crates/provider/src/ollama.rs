//! Ollama transport.
//!
//! Talks to `/api/chat`, `/api/tags` and `/api/version` on a local server.

use std::sync::Arc;

use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::*;

pub const DEFAULT_HOST: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: Client,
    host: String,
    default_model: String,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

impl OllamaProvider {
    pub fn new(host: impl Into<String>, default_model: impl Into<String>) -> Self {
        let host = host.into();
        let host = host.trim_end_matches('/').to_string();

        Self {
            client: Client::new(),
            host,
            default_model: default_model.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn build_request(&self, params: &ChatParams) -> Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<Value> = params
            .messages
            .iter()
            .map(|m| {
                let mut obj = json!({
                    "role": m.role.as_str(),
                    "content": &m.content,
                });
                if let Some(name) = &m.name {
                    obj["name"] = json!(name);
                }
                if !m.tool_calls.is_empty() {
                    let calls: Vec<Value> = m
                        .tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "function": {
                                    "name": &c.name,
                                    "arguments": &c.arguments
                                }
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                }
                obj
            })
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": params.stream,
        });

        if !params.tools.is_empty() {
            body["tools"] = json!(params.tools);
        }
        if let Some(temperature) = params.temperature {
            body["options"] = json!({ "temperature": temperature });
        }

        body
    }

    /// Probe the server; used once at startup.
    pub async fn version(&self) -> Result<String> {
        let url = format!("{}/api/version", self.host);
        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;
        let version: VersionResponse = response.json().await?;
        Ok(version.version)
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.host);
        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Ollama reports failures as `{"error": "..."}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn absorb(event: DecodeEvent, assembler: &mut TurnAssembler, sink: &dyn StreamSink) -> Result<()> {
    match event {
        DecodeEvent::Record(record) => {
            if let Some(error) = record.error.clone() {
                return Err(ProviderError::Api(error));
            }
            let delta = assembler.push(record);
            if !delta.is_empty() {
                sink.on_text(&delta);
            }
        }
        DecodeEvent::Malformed { line, error } => sink.on_decode_error(&line, &error),
    }
    Ok(())
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat(&self, params: ChatParams, sink: Arc<dyn StreamSink>) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.host);
        let body = self.build_request(&params);
        debug!(
            "chat request: model={} messages={} tools={} stream={}",
            body["model"],
            params.messages.len(),
            params.tools.len(),
            params.stream
        );

        let response = self.client.post(&url).json(&body).send().await?;
        let response = check_status(response).await?;

        let mut decoder = FrameDecoder::new();
        let mut assembler = TurnAssembler::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            trace!("received {} bytes", chunk.len());
            for event in decoder.push(&chunk) {
                absorb(event, &mut assembler, sink.as_ref())?;
            }
        }
        for event in decoder.finish() {
            absorb(event, &mut assembler, sink.as_ref())?;
        }

        let turn = assembler.finish();
        debug!(
            "chat response: {} chars, {} tool calls, done_reason={}",
            turn.content.len(),
            turn.tool_calls.len(),
            turn.done_reason
        );
        Ok(turn)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.fetch_models().await
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }
}
