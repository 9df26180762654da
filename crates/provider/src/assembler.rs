//! Turn assembly.
//!
//! Folds the records of one round-trip into a single [`ChatResponse`].

use serde_json::{json, Value};

use crate::decoder::{StreamRecord, ToolCallFragment};
use crate::{ChatResponse, ToolCall, Usage};

#[derive(Debug, Default)]
pub struct TurnAssembler {
    content: String,
    calls: Vec<PartialCall>,
    done: bool,
    done_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Default)]
struct PartialCall {
    index: Option<usize>,
    id: String,
    name: String,
    arguments: ArgumentBuffer,
}

#[derive(Debug, Default)]
enum ArgumentBuffer {
    #[default]
    Empty,
    Raw(String),
    Structured(Value),
}

impl ArgumentBuffer {
    fn absorb(&mut self, value: Value) {
        match value {
            Value::Null => {}
            Value::String(text) => match self {
                ArgumentBuffer::Raw(buf) => buf.push_str(&text),
                _ => *self = ArgumentBuffer::Raw(text),
            },
            other => *self = ArgumentBuffer::Structured(other),
        }
    }

    /// Raw text that is not valid JSON is kept verbatim as a string value.
    fn resolve(self) -> Value {
        match self {
            ArgumentBuffer::Empty => json!({}),
            ArgumentBuffer::Structured(value) => value,
            ArgumentBuffer::Raw(text) if text.trim().is_empty() => json!({}),
            ArgumentBuffer::Raw(text) => {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            }
        }
    }
}

impl TurnAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one record and return the text it contributed.
    pub fn push(&mut self, record: StreamRecord) -> String {
        let mut delta = String::new();

        if let Some(message) = record.message {
            if let Some(text) = message.content {
                self.content.push_str(&text);
                delta = text;
            }
            for fragment in message.tool_calls.unwrap_or_default() {
                self.merge(fragment);
            }
        }

        self.done |= record.done;
        if let Some(reason) = record.done_reason.filter(|r| !r.is_empty()) {
            self.done_reason = Some(reason);
        }
        if let Some(count) = record.prompt_eval_count {
            self.usage.prompt_tokens = count;
        }
        if let Some(count) = record.eval_count {
            self.usage.completion_tokens = count;
        }

        delta
    }

    /// Fragments with an `index` continue the call at that index; all others
    /// start a new call.
    fn merge(&mut self, fragment: ToolCallFragment) {
        let existing = fragment
            .index
            .and_then(|i| self.calls.iter().position(|c| c.index == Some(i)));
        let slot = match existing {
            Some(pos) => pos,
            None => {
                self.calls.push(PartialCall {
                    index: fragment.index,
                    ..Default::default()
                });
                self.calls.len() - 1
            }
        };
        let call = &mut self.calls[slot];

        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            call.id = id;
        }
        let function = fragment.function.unwrap_or_default();
        if let Some(name) = function.name.filter(|name| !name.is_empty()) {
            call.name = name;
        }
        if let Some(arguments) = function.arguments {
            call.arguments.absorb(arguments);
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn finish(self) -> ChatResponse {
        let tool_calls: Vec<ToolCall> = self
            .calls
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.name,
                arguments: call.arguments.resolve(),
            })
            .collect();

        let done_reason = self.done_reason.unwrap_or_else(|| {
            if tool_calls.is_empty() {
                "stop".to_string()
            } else {
                "tool_calls".to_string()
            }
        });

        let mut usage = self.usage;
        usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;

        ChatResponse {
            content: self.content,
            tool_calls,
            done_reason,
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{FunctionFragment, RecordMessage};

    fn text(content: &str) -> StreamRecord {
        StreamRecord {
            message: Some(RecordMessage {
                content: Some(content.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn fragment(index: Option<usize>, name: Option<&str>, arguments: Option<Value>) -> ToolCallFragment {
        ToolCallFragment {
            id: None,
            index,
            function: Some(FunctionFragment {
                name: name.map(str::to_string),
                arguments,
            }),
        }
    }

    fn calls(fragments: Vec<ToolCallFragment>) -> StreamRecord {
        StreamRecord {
            message: Some(RecordMessage {
                tool_calls: Some(fragments),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn assemble(records: Vec<StreamRecord>) -> ChatResponse {
        let mut assembler = TurnAssembler::new();
        for record in records {
            assembler.push(record);
        }
        assembler.finish()
    }

    // ========== Text Tests ==========

    #[test]
    fn test_push_returns_delta_and_accumulates() {
        let mut assembler = TurnAssembler::new();
        assert_eq!(assembler.push(text("Hel")), "Hel");
        assert_eq!(assembler.push(text("lo")), "lo");
        assert_eq!(assembler.push(StreamRecord::default()), "");

        let turn = assembler.finish();
        assert_eq!(turn.content, "Hello");
        assert!(!turn.has_tool_calls());
        assert_eq!(turn.done_reason, "stop");
    }

    #[test]
    fn test_done_reason_and_usage() {
        let mut assembler = TurnAssembler::new();
        assembler.push(text("ok"));
        assert!(!assembler.is_done());
        assembler.push(StreamRecord {
            done: true,
            done_reason: Some("length".to_string()),
            prompt_eval_count: Some(20),
            eval_count: Some(5),
            ..Default::default()
        });
        assert!(assembler.is_done());

        let turn = assembler.finish();
        assert_eq!(turn.done_reason, "length");
        assert_eq!(turn.usage.prompt_tokens, 20);
        assert_eq!(turn.usage.completion_tokens, 5);
        assert_eq!(turn.usage.total_tokens, 25);
    }

    #[test]
    fn test_empty_stream_yields_empty_turn() {
        let turn = assemble(vec![]);
        assert!(turn.content.is_empty());
        assert!(turn.tool_calls.is_empty());
    }

    // ========== Tool Call Tests ==========

    #[test]
    fn test_tool_call_only_turn_is_valid() {
        let turn = assemble(vec![calls(vec![fragment(
            None,
            Some("calculator"),
            Some(json!({"expression": "2+2"})),
        )])]);

        assert!(turn.content.is_empty());
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].name, "calculator");
        assert_eq!(turn.tool_calls[0].arguments, json!({"expression": "2+2"}));
        assert_eq!(turn.done_reason, "tool_calls");
    }

    #[test]
    fn test_string_arguments_parse_like_structured() {
        let structured = json!({"path": "notes.txt", "content": "a \"quoted\" line", "n": [1, 2]});
        let as_string = Value::String(structured.to_string());

        let from_structured =
            assemble(vec![calls(vec![fragment(None, Some("write_file"), Some(structured.clone()))])]);
        let from_string = assemble(vec![calls(vec![fragment(None, Some("write_file"), Some(as_string))])]);

        assert_eq!(from_string.tool_calls, from_structured.tool_calls);
        assert_eq!(from_string.tool_calls[0].arguments, structured);
    }

    #[test]
    fn test_invalid_string_arguments_are_preserved() {
        let turn = assemble(vec![calls(vec![fragment(
            None,
            Some("bash"),
            Some(json!("ls -la {oops")),
        )])]);
        assert_eq!(turn.tool_calls[0].arguments, json!("ls -la {oops"));
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let turn = assemble(vec![calls(vec![
            ToolCallFragment::default(),
            fragment(None, Some("list_models"), Some(json!(""))),
        ])]);

        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].id, "");
        assert_eq!(turn.tool_calls[0].name, "");
        assert_eq!(turn.tool_calls[0].arguments, json!({}));
        assert_eq!(turn.tool_calls[1].arguments, json!({}));
    }

    #[test]
    fn test_unindexed_calls_keep_received_order() {
        let turn = assemble(vec![
            calls(vec![fragment(None, Some("read_file"), Some(json!({"path": "a"})))]),
            text("thinking"),
            calls(vec![
                fragment(None, Some("read_file"), Some(json!({"path": "b"}))),
                fragment(None, Some("calculator"), Some(json!({"expression": "1"}))),
            ]),
        ]);

        let names: Vec<&str> = turn.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["read_file", "read_file", "calculator"]);
        assert_eq!(turn.tool_calls[1].arguments, json!({"path": "b"}));
        assert_eq!(turn.content, "thinking");
    }

    #[test]
    fn test_indexed_fragments_merge() {
        let mut first = fragment(Some(0), Some("bash"), Some(json!("{\"comm")));
        first.id = Some("call_7".to_string());
        let turn = assemble(vec![
            calls(vec![first]),
            calls(vec![
                fragment(Some(0), None, Some(json!("and\":\"ls\"}"))),
                fragment(Some(1), Some("calculator"), Some(json!("{\"expression\":\"3*3\"}"))),
            ]),
        ]);

        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].id, "call_7");
        assert_eq!(turn.tool_calls[0].name, "bash");
        assert_eq!(turn.tool_calls[0].arguments, json!({"command": "ls"}));
        assert_eq!(turn.tool_calls[1].arguments, json!({"expression": "3*3"}));
    }
}
