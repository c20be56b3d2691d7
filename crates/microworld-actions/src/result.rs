use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Action parameters as supplied by the agent.
pub type Params = Map<String, Value>;

/// Minimal map of world-state fields changed by an action.
pub type StateDelta = Map<String, Value>;

/// Outcome of one action request.
///
/// Only built through the constructors below, which keep `state_delta`
/// empty on failure and `error` absent on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    success: bool,
    #[serde(default)]
    state_delta: StateDelta,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ActionResult {
    pub fn ok(state_delta: StateDelta, message: impl Into<String>) -> Self {
        Self {
            success: true,
            state_delta,
            message: message.into(),
            error: None,
        }
    }

    /// Success that changed nothing observable.
    pub fn unchanged(message: impl Into<String>) -> Self {
        Self::ok(StateDelta::new(), message)
    }

    pub fn fail(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            state_delta: StateDelta::new(),
            message: message.into(),
            error: Some(error.into()),
        }
    }

    pub fn unknown_action(action_id: &str) -> Self {
        let message = format!("Unknown action: {action_id}");
        Self::fail(message.clone(), message)
    }

    pub fn invalid_params(error: impl Into<String>) -> Self {
        Self::fail("Invalid parameters", error)
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn state_delta(&self) -> &StateDelta {
        &self.state_delta
    }

    pub fn into_state_delta(self) -> StateDelta {
        self.state_delta
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
