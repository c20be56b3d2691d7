//! Deployment event protocol.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    System,
    Text,
    Thinking,
    ToolCall,
    ToolResult,
    WorldUpdate,
    Error,
    Complete,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Text => "text",
            Self::Thinking => "thinking",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::WorldUpdate => "world_update",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }
}

/// Error codes carried by `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    WorldNotFound,
    GameEngineInitFailed,
    ActionExecutionFailed,
    ActionExecutionError,
    ToolExecutionFailed,
    DeploymentFailed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorldNotFound => "world_not_found",
            Self::GameEngineInitFailed => "game_engine_init_failed",
            Self::ActionExecutionFailed => "action_execution_failed",
            Self::ActionExecutionError => "action_execution_error",
            Self::ToolExecutionFailed => "tool_execution_failed",
            Self::DeploymentFailed => "deployment_failed",
        }
    }

    /// Whether the session keeps running after this error.
    pub fn recoverable(self) -> bool {
        matches!(
            self,
            Self::ActionExecutionFailed | Self::ActionExecutionError | Self::ToolExecutionFailed
        )
    }
}

/// One typed unit of a session's output.
///
/// Wire shape: `{"event_type": "...", "data": {..., "timestamp": "..."}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    pub event_type: EventType,
    pub data: Map<String, Value>,
}

impl DeploymentEvent {
    pub fn new(event_type: EventType, mut data: Map<String, Value>) -> Self {
        data.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
        Self { event_type, data }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_text(EventType::System, text.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::with_text(EventType::Text, text.into())
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self::with_text(EventType::Thinking, text.into())
    }

    pub fn tool_call(tool_name: &str, parameters: Value) -> Self {
        Self::new(
            EventType::ToolCall,
            object(json!({"tool_name": tool_name, "parameters": parameters})),
        )
    }

    pub fn tool_result(tool_name: &str, result: Value, duration_ms: u64) -> Self {
        Self::new(
            EventType::ToolResult,
            object(json!({
                "tool_name": tool_name,
                "success": true,
                "result": result,
                "duration_ms": duration_ms,
            })),
        )
    }

    /// `delta` fields plus the action's message.
    pub fn world_update(mut delta: Map<String, Value>, message: &str) -> Self {
        delta.insert("message".into(), Value::String(message.to_string()));
        Self::new(EventType::WorldUpdate, delta)
    }

    /// An error event; `context` adds fields such as `action_id` or `tool_name`.
    pub fn error(code: ErrorCode, message: impl Into<String>, context: Map<String, Value>) -> Self {
        let mut data = context;
        data.insert("error_code".into(), json!(code.as_str()));
        data.insert("message".into(), Value::String(message.into()));
        data.insert("recoverable".into(), Value::Bool(code.recoverable()));
        Self::new(EventType::Error, data)
    }

    pub fn complete(total_steps: u64, total_tools_used: u64, final_position: Value) -> Self {
        Self::new(
            EventType::Complete,
            object(json!({
                "status": "success",
                "goal_achieved": true,
                "total_steps": total_steps,
                "total_tools_used": total_tools_used,
                "final_position": final_position,
            })),
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        if self.event_type != EventType::Error {
            return None;
        }
        self.data
            .get("error_code")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// `false` for non-recoverable errors; consumers stop listening then.
    pub fn is_recoverable(&self) -> bool {
        self.data
            .get("recoverable")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        match self.event_type {
            EventType::Complete => true,
            EventType::Error => !self.is_recoverable(),
            _ => false,
        }
    }

    fn with_text(event_type: EventType, text: String) -> Self {
        Self::new(event_type, object(json!({"text": text})))
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
