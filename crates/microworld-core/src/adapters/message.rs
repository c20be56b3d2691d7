//! Messages produced by a reasoning process.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound message. The set is closed; every variant maps to exactly
/// one branch of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    System {
        text: String,
    },
    /// Terminal message. Only ends the session when `stop_reason` is set.
    Result {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    Assistant {
        #[serde(default)]
        content: Vec<ContentBlock>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        name: String,
        #[serde(default)]
        content: Vec<TextBlock>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl AgentMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self::Result {
            stop_reason: Some(reason.into()),
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::Assistant { content }
    }
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self::Thinking { text: text.into() }
    }

    pub fn tool_use(name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            name: name.into(),
            input,
        }
    }

    /// Tool result carrying a single text block.
    pub fn tool_result(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ToolResult {
            name: name.into(),
            content: vec![TextBlock { text: text.into() }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tagged_wire_shape() {
        let msg: AgentMessage = serde_json::from_value(json!({
            "type": "assistant",
            "content": [
                {"type": "thinking", "text": "hmm"},
                {"type": "tool_use", "name": "move", "input": {"direction": "east"}},
                {"type": "tool_result", "name": "move",
                 "content": [{"type": "text", "text": "{}"}]}
            ]
        }))
        .unwrap();

        let AgentMessage::Assistant { content } = msg else {
            panic!("expected assistant message");
        };
        assert_eq!(content.len(), 3);
        assert_eq!(content[2], ContentBlock::tool_result("move", "{}"));

        let done: AgentMessage = serde_json::from_str(r#"{"type":"result"}"#).unwrap();
        assert_eq!(done, AgentMessage::Result { stop_reason: None });
    }
}
