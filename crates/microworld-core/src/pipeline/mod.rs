//! Deployment pipeline - runs one reasoning session against one world and
//! streams typed events to a consumer.

mod engines;
mod event;
mod prompt;
mod session;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use microworld_actions::{ActionEngine, Params};
use microworld_grid::{Position, WorldState};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::adapters::{AgentMessage, ContentBlock, ReasoningLauncher, TextBlock};
use crate::config::{DeployConfig, ProcessSpec};
use crate::state::{ToolStore, WorldStateStore, WorldStore};
use crate::worker::ToolWorkerSpec;

pub use engines::{EngineInitError, EngineRegistry};
pub use event::{DeploymentEvent, ErrorCode, EventType};
pub use prompt::build_prompt;
pub use session::DeploymentSession;

/// What to deploy: which agent, into which world, to do what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub agent_id: String,
    pub world_id: String,
    pub goal: String,
}

impl DeploymentRequest {
    pub fn new(
        agent_id: impl Into<String>,
        world_id: impl Into<String>,
        goal: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            world_id: world_id.into(),
            goal: goal.into(),
        }
    }
}

/// Orchestrates a single deployment session.
///
/// A pipeline is consumed by [`DeploymentPipeline::deploy`]; a new session
/// needs a new pipeline.
pub struct DeploymentPipeline {
    worlds: Arc<dyn WorldStore>,
    tools: Arc<dyn ToolStore>,
    reasoning: Arc<dyn ReasoningLauncher>,
    engines: Arc<EngineRegistry>,
    states: WorldStateStore,
    tool_worker: ProcessSpec,
    event_buffer: usize,
}

impl DeploymentPipeline {
    pub fn new(
        worlds: Arc<dyn WorldStore>,
        tools: Arc<dyn ToolStore>,
        reasoning: Arc<dyn ReasoningLauncher>,
        engines: Arc<EngineRegistry>,
        states: WorldStateStore,
    ) -> Self {
        let defaults = DeployConfig::default();
        Self {
            worlds,
            tools,
            reasoning,
            engines,
            states,
            tool_worker: defaults.tool_worker,
            event_buffer: defaults.event_buffer,
        }
    }

    /// Take the tool worker command and channel capacity from `config`.
    pub fn with_config(mut self, config: &DeployConfig) -> Self {
        self.tool_worker = config.tool_worker.clone();
        self.event_buffer = config.event_buffer;
        self
    }

    /// Start the session on a worker task and return the consumer handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn deploy(self, request: DeploymentRequest) -> DeploymentSession {
        let session_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.event_buffer.max(1));

        let span = tracing::info_span!(
            "deployment",
            session_id = %session_id,
            agent_id = %request.agent_id,
            world_id = %request.world_id,
        );
        let task = tokio::spawn(self.run(session_id.clone(), request, tx).instrument(span));

        DeploymentSession::new(session_id, rx, task)
    }

    async fn run(
        self,
        session_id: String,
        request: DeploymentRequest,
        tx: mpsc::Sender<DeploymentEvent>,
    ) {
        let sink = EventSink { tx };

        match self.drive(&session_id, &request, &sink).await {
            Ok(()) => {}
            Err(Halt::Disconnected) => {
                tracing::info!("Consumer disconnected, ending session");
            }
            Err(Halt::Fault(e)) => {
                tracing::error!(error = %format!("{e:#}"), "Deployment failed");
                let event = DeploymentEvent::error(
                    ErrorCode::DeploymentFailed,
                    format!("{e:#}"),
                    Map::new(),
                );
                let _ = sink.emit(event).await;
            }
        }

        self.states.release(&request.world_id, &session_id);
    }

    async fn drive(
        &self,
        session_id: &str,
        request: &DeploymentRequest,
        sink: &EventSink,
    ) -> Result<(), Halt> {
        tracing::info!(goal = %request.goal, "Starting deployment");

        let Some(snapshot) = self
            .worlds
            .get_world(&request.world_id)
            .await
            .context("Failed to load world")?
        else {
            tracing::warn!("World not found");
            let event = DeploymentEvent::error(
                ErrorCode::WorldNotFound,
                format!("World not found: {}", request.world_id),
                context("world_id", &request.world_id),
            );
            return sink.emit(event).await;
        };

        let (engine, world) = match self.engines.create(&snapshot) {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(game_type = %snapshot.game_type, error = %e, "Engine init failed");
                let event = DeploymentEvent::error(
                    ErrorCode::GameEngineInitFailed,
                    e.to_string(),
                    context("game_type", &snapshot.game_type),
                );
                return sink.emit(event).await;
            }
        };

        self.states
            .set(&request.world_id, world.clone())
            .context("Failed to publish initial world state")?;
        if let Some(previous) = self.states.claim(&request.world_id, session_id) {
            tracing::warn!(
                previous_session = %previous,
                "World already has a live session; both will write to it"
            );
        }

        let tools = self
            .tools
            .get_agent_tools(&request.agent_id)
            .await
            .context("Failed to load agent tools")?;
        let prompt = build_prompt(&request.goal, &world, &tools);

        let worker = {
            let action_ids: Vec<&str> = engine
                .schemas()
                .iter()
                .map(|s| s.action_id.as_str())
                .collect();
            ToolWorkerSpec::for_session(
                &self.tool_worker,
                session_id,
                &request.world_id,
                &action_ids,
                self.states.mirror_path(&request.world_id).as_deref(),
            )
        };

        let mut process = self
            .reasoning
            .launch(&worker)
            .await
            .context("Failed to start reasoning process")?;
        process
            .submit(&prompt)
            .await
            .context("Failed to submit prompt")?;

        let mut session = Session {
            world_id: request.world_id.clone(),
            states: self.states.clone(),
            engine,
            position: world.agent_position,
            total_steps: 0,
            total_tools_used: 0,
            pending_calls: HashMap::new(),
        };

        while let Some(message) = process
            .next_message()
            .await
            .context("Reasoning process failed")?
        {
            match message {
                AgentMessage::System { text } => sink.emit(DeploymentEvent::system(text)).await?,
                AgentMessage::Result {
                    stop_reason: Some(reason),
                } => {
                    tracing::info!(stop_reason = %reason, "Reasoning process finished");
                    break;
                }
                AgentMessage::Result { stop_reason: None } => {
                    tracing::debug!("Result message without stop reason");
                }
                AgentMessage::Assistant { content } => {
                    for block in content {
                        session.handle_block(block, sink).await?;
                    }
                }
            }
        }

        tracing::info!(
            total_steps = session.total_steps,
            total_tools_used = session.total_tools_used,
            final_position = %session.position,
            "Deployment complete"
        );
        sink.emit(DeploymentEvent::complete(
            session.total_steps,
            session.total_tools_used,
            json!([session.position.x, session.position.y]),
        ))
        .await
    }
}

/// Why a session stopped early.
enum Halt {
    /// The consumer dropped its receiver.
    Disconnected,
    Fault(anyhow::Error),
}

impl From<anyhow::Error> for Halt {
    fn from(e: anyhow::Error) -> Self {
        Halt::Fault(e)
    }
}

struct EventSink {
    tx: mpsc::Sender<DeploymentEvent>,
}

impl EventSink {
    async fn emit(&self, event: DeploymentEvent) -> Result<(), Halt> {
        tracing::trace!(event_type = event.event_type.as_str(), "Emitting event");
        self.tx.send(event).await.map_err(|_| Halt::Disconnected)
    }
}

/// Mutable per-session state; the only writer of the session's world.
struct Session {
    world_id: String,
    states: WorldStateStore,
    engine: Box<dyn ActionEngine>,
    position: Position,
    total_steps: u64,
    total_tools_used: u64,
    pending_calls: HashMap<String, Instant>,
}

#[derive(Debug, Clone, PartialEq)]
struct ActionInvocation {
    action_id: String,
    parameters: Params,
}

impl Session {
    async fn handle_block(&mut self, block: ContentBlock, sink: &EventSink) -> Result<(), Halt> {
        match block {
            ContentBlock::Text { text } => {
                self.total_steps += 1;
                sink.emit(DeploymentEvent::text(text)).await
            }
            ContentBlock::Thinking { text } => sink.emit(DeploymentEvent::thinking(text)).await,
            ContentBlock::ToolUse { name, input } => {
                self.total_tools_used += 1;
                self.pending_calls.insert(name.clone(), Instant::now());
                sink.emit(DeploymentEvent::tool_call(&name, input)).await
            }
            ContentBlock::ToolResult { name, content } => {
                self.handle_tool_result(name, content, sink).await
            }
        }
    }

    async fn handle_tool_result(
        &mut self,
        name: String,
        content: Vec<TextBlock>,
        sink: &EventSink,
    ) -> Result<(), Halt> {
        let duration_ms = self
            .pending_calls
            .remove(&name)
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        let text: String = content.iter().map(|b| b.text.as_str()).collect();
        let payload = decode_payload(&text);
        let invocation = parse_invocation(&payload);

        sink.emit(DeploymentEvent::tool_result(&name, payload, duration_ms))
            .await?;

        match invocation {
            Ok(None) => Ok(()),
            Ok(Some(invocation)) => self.run_action(invocation, sink).await,
            Err(reason) => {
                tracing::warn!(tool_name = %name, %reason, "Tool result could not be handled");
                let event = DeploymentEvent::error(
                    ErrorCode::ToolExecutionFailed,
                    reason,
                    context("tool_name", &name),
                );
                sink.emit(event).await
            }
        }
    }

    async fn run_action(
        &mut self,
        invocation: ActionInvocation,
        sink: &EventSink,
    ) -> Result<(), Halt> {
        let ActionInvocation {
            action_id,
            parameters,
        } = invocation;

        let result = match self.engine.execute(&action_id, parameters) {
            Ok(result) => result,
            Err(fault) => {
                tracing::error!(action_id = %action_id, error = %fault, "Action raised a fault");
                let event = DeploymentEvent::error(
                    ErrorCode::ActionExecutionError,
                    fault.to_string(),
                    context("action_id", &action_id),
                );
                return sink.emit(event).await;
            }
        };

        if !result.success() {
            tracing::info!(action_id = %action_id, message = result.message(), "Action rejected");
            let mut ctx = context("action_id", &action_id);
            if let Some(detail) = result.error() {
                ctx.insert("details".into(), Value::String(detail.to_string()));
            }
            let event =
                DeploymentEvent::error(ErrorCode::ActionExecutionFailed, result.message(), ctx);
            return sink.emit(event).await;
        }

        let message = result.message().to_string();
        let delta = result.into_state_delta();
        if delta.is_empty() {
            tracing::debug!(action_id = %action_id, %message, "Action changed nothing");
            return Ok(());
        }

        // The engine has already applied the action, so track it even when
        // publishing fails.
        if let Some(position) = delta
            .get("agent_position")
            .and_then(|v| serde_json::from_value::<Position>(v.clone()).ok())
        {
            self.position = position;
        }

        if let Err(e) = self.states.apply_delta(&self.world_id, &delta) {
            tracing::error!(action_id = %action_id, error = %e, "Failed to publish world update");
            self.resync_store();
            let event = DeploymentEvent::error(
                ErrorCode::ActionExecutionError,
                format!("Failed to publish world update: {e}"),
                context("action_id", &action_id),
            );
            return sink.emit(event).await;
        }

        sink.emit(DeploymentEvent::world_update(delta, &message))
            .await
    }

    /// Overwrite the shared snapshot with the engine's own world.
    fn resync_store(&self) {
        let world = match serde_json::from_value::<WorldState>(self.engine.snapshot()) {
            Ok(world) => world,
            Err(e) => {
                tracing::warn!(error = %e, "Engine snapshot unavailable, store not resynced");
                return;
            }
        };
        if let Err(e) = self.states.set(&self.world_id, world) {
            tracing::warn!(error = %e, "Store resync incomplete");
        }
    }
}

/// Decode a tool result's text, wrapping non-JSON as `{"raw": text}`.
fn decode_payload(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// Pull an action invocation out of a decoded payload.
///
/// No `action` key means no action this round. A present but malformed
/// `action` is an error.
fn parse_invocation(payload: &Value) -> Result<Option<ActionInvocation>, String> {
    let Some(action) = payload.get("action").filter(|a| !a.is_null()) else {
        return Ok(None);
    };
    let action = action
        .as_object()
        .ok_or_else(|| "`action` must be an object".to_string())?;
    let action_id = action
        .get("action_id")
        .and_then(Value::as_str)
        .ok_or_else(|| "`action.action_id` must be a string".to_string())?;
    let parameters = match action.get("parameters") {
        None | Some(Value::Null) => Params::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err("`action.parameters` must be an object".to_string()),
    };

    Ok(Some(ActionInvocation {
        action_id: action_id.to_string(),
        parameters,
    }))
}

fn context(key: &str, value: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), Value::String(value.to_string()));
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_json_payload_is_wrapped() {
        assert_eq!(decode_payload("moved!"), json!({"raw": "moved!"}));
        assert_eq!(decode_payload(r#"{"ok":1}"#), json!({"ok": 1}));
    }

    #[test]
    fn missing_action_key_is_not_an_error() {
        assert_eq!(parse_invocation(&json!({"raw": "hello"})), Ok(None));
        assert_eq!(parse_invocation(&json!([1, 2, 3])), Ok(None));
        assert_eq!(parse_invocation(&json!({"action": null})), Ok(None));
    }

    #[test]
    fn action_object_is_parsed() {
        let parsed = parse_invocation(&json!({
            "action": {"action_id": "move", "parameters": {"direction": "east"}}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(parsed.action_id, "move");
        assert_eq!(parsed.parameters["direction"], "east");

        let bare = parse_invocation(&json!({"action": {"action_id": "wait"}}))
            .unwrap()
            .unwrap();
        assert!(bare.parameters.is_empty());
    }

    #[test]
    fn malformed_action_is_rejected() {
        assert!(parse_invocation(&json!({"action": "move"})).is_err());
        assert!(parse_invocation(&json!({"action": {"action_id": 3}})).is_err());
        assert!(parse_invocation(&json!({
            "action": {"action_id": "move", "parameters": [1]}
        }))
        .is_err());
    }
}
