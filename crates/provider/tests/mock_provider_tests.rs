//! Mock Provider Tests
//!
//! The agent loop depends on `Provider` only through the trait, so it must be
//! mockable with mockall and usable as a trait object.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockall::mock;
use neoneo_provider::{
    ChatParams, ChatResponse, Message, ModelInfo, NullSink, Provider, ProviderError, Role,
    StreamSink, Tool, ToolCall,
};
use serde_json::json;

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn chat(
            &self,
            params: ChatParams,
            sink: Arc<dyn StreamSink>,
        ) -> Result<ChatResponse, ProviderError>;
        async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;
        fn default_model(&self) -> String;
        fn is_configured(&self) -> bool;
    }
}

#[derive(Default)]
struct RecordingSink {
    chunks: Mutex<Vec<String>>,
}

impl StreamSink for RecordingSink {
    fn on_text(&self, delta: &str) {
        self.chunks.lock().unwrap().push(delta.to_string());
    }
}

fn null_sink() -> Arc<dyn StreamSink> {
    Arc::new(NullSink)
}

#[tokio::test]
async fn test_mock_provider_chat_returns_success() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .returning(|_, _| Ok(ChatResponse::text("Hello from mock!")));

    let response = mock.chat(ChatParams::default(), null_sink()).await.unwrap();

    assert_eq!(response.content, "Hello from mock!");
    assert!(!response.has_tool_calls());
}

#[tokio::test]
async fn test_mock_provider_chat_returns_error() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .returning(|_, _| Err(ProviderError::Api("model 'x' not found".to_string())));

    let result = mock.chat(ChatParams::default(), null_sink()).await;

    match result {
        Err(ProviderError::Api(msg)) => assert_eq!(msg, "model 'x' not found"),
        other => panic!("Expected Api error, got {:?}", other.map(|r| r.content)),
    }
}

#[tokio::test]
async fn test_mock_provider_chat_with_tool_calls() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .withf(|params, _| params.messages.len() == 1 && params.messages[0].role == Role::User)
        .returning(|_, _| {
            Ok(ChatResponse::with_tool_calls(
                "",
                vec![ToolCall {
                    id: String::new(),
                    name: "calculator".to_string(),
                    arguments: json!({"expression": "2+2"}),
                }],
            ))
        });

    let params = ChatParams {
        model: "llama3".to_string(),
        messages: vec![Message::user("what is 2+2")],
        ..Default::default()
    };

    let response = mock.chat(params, null_sink()).await.unwrap();

    assert!(response.has_tool_calls());
    assert_eq!(response.tool_calls[0].name, "calculator");
}

#[tokio::test]
async fn test_mock_provider_streams_into_sink() {
    let mut mock = MockProvider::new();

    mock.expect_chat().times(1).returning(|_, sink| {
        sink.on_text("Hel");
        sink.on_text("lo");
        Ok(ChatResponse::text("Hello"))
    });

    let sink = Arc::new(RecordingSink::default());
    let response = mock.chat(ChatParams::default(), sink.clone()).await.unwrap();

    assert_eq!(response.content, "Hello");
    assert_eq!(*sink.chunks.lock().unwrap(), vec!["Hel", "lo"]);
}

#[tokio::test]
async fn test_mock_provider_with_tools_advertised() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .withf(|params, _| {
            params.model == "llama3"
                && params.tools.len() == 1
                && params.tools[0].function.name == "calculator"
                && !params.stream
        })
        .returning(|_, _| Ok(ChatResponse::text("ok")));

    let params = ChatParams {
        model: "llama3".to_string(),
        messages: vec![Message::system("You are helpful"), Message::user("Hello")],
        tools: vec![Tool::new(
            "calculator",
            "Evaluate math",
            json!({"type": "object", "properties": {}}),
        )],
        stream: false,
        temperature: None,
    };

    assert_eq!(mock.chat(params, null_sink()).await.unwrap().content, "ok");
}

#[tokio::test]
async fn test_mock_provider_list_models() {
    let mut mock = MockProvider::new();

    mock.expect_list_models().times(1).returning(|| {
        Ok(vec![ModelInfo {
            name: "llama3:latest".to_string(),
            size: Some(4_661_224_676),
            modified_at: None,
        }])
    });

    let models = mock.list_models().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name, "llama3:latest");
}

#[test]
fn test_mock_provider_default_model() {
    let mut mock = MockProvider::new();

    mock.expect_default_model()
        .times(1)
        .returning(|| "llama3".to_string());

    assert_eq!(mock.default_model(), "llama3");
}

#[test]
fn test_mock_provider_is_configured() {
    let mut mock = MockProvider::new();

    mock.expect_is_configured().times(1).returning(|| false);

    assert!(!mock.is_configured());
}

struct ProviderConsumer {
    provider: Box<dyn Provider>,
}

impl ProviderConsumer {
    async fn process_message(&self, message: &str) -> Result<String, ProviderError> {
        let params = ChatParams {
            model: "llama3".to_string(),
            messages: vec![Message::user(message)],
            ..Default::default()
        };

        let response = self.provider.chat(params, Arc::new(NullSink)).await?;
        Ok(response.content)
    }
}

#[tokio::test]
async fn test_mock_provider_as_trait_object() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .returning(|_, _| Ok(ChatResponse::text("Processed!")));

    let consumer = ProviderConsumer {
        provider: Box::new(mock),
    };

    assert_eq!(consumer.process_message("Hello").await.unwrap(), "Processed!");
}
