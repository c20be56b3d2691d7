//! Tool worker - session-scoped process that executes an agent's tool calls.
//!
//! The worker never mutates the world. `observe` reads the mirrored live
//! snapshot; action tools answer with an action invocation that the
//! deployment pipeline then runs against the engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use microworld_grid::WorldState;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::ProcessSpec;
use crate::state::OBSERVE_TOOL;

pub const SESSION_ENV: &str = "MICROWORLD_SESSION_ID";
pub const WORLD_ENV: &str = "MICROWORLD_WORLD_ID";
pub const SNAPSHOT_ENV: &str = "MICROWORLD_SNAPSHOT";
pub const ACTIONS_ENV: &str = "MICROWORLD_ACTIONS";

/// How to start a session's tool worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolWorkerSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ToolWorkerSpec {
    /// Descriptor for one session, with session, world, action names and
    /// snapshot location injected into the environment.
    pub fn for_session(
        base: &ProcessSpec,
        session_id: &str,
        world_id: &str,
        action_ids: &[&str],
        snapshot: Option<&Path>,
    ) -> Self {
        let mut env = base.env.clone();
        env.insert(SESSION_ENV.to_string(), session_id.to_string());
        env.insert(WORLD_ENV.to_string(), world_id.to_string());
        env.insert(ACTIONS_ENV.to_string(), action_ids.join(","));
        if let Some(path) = snapshot {
            env.insert(SNAPSHOT_ENV.to_string(), path.display().to_string());
        }
        Self {
            command: base.command.clone(),
            args: base.args.clone(),
            env,
        }
    }
}

/// A tool call sent to the worker, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub tool: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub text: String,
    #[serde(default)]
    pub is_error: bool,
}

/// Answers tool calls for one world.
#[derive(Debug, Clone)]
pub struct ToolWorker {
    world_id: String,
    snapshot: Option<PathBuf>,
    actions: Vec<String>,
}

impl ToolWorker {
    pub fn new(world_id: impl Into<String>, snapshot: Option<PathBuf>, actions: Vec<String>) -> Self {
        Self {
            world_id: world_id.into(),
            snapshot,
            actions,
        }
    }

    /// Build from the variables set by [`ToolWorkerSpec::for_session`].
    pub fn from_env() -> Result<Self> {
        let world_id = std::env::var(WORLD_ENV).with_context(|| format!("{WORLD_ENV} not set"))?;
        let snapshot = std::env::var_os(SNAPSHOT_ENV).map(PathBuf::from);
        let actions = std::env::var(ACTIONS_ENV)
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Ok(Self::new(world_id, snapshot, actions))
    }

    pub fn handle(&self, request: ToolRequest) -> ToolResponse {
        let id = request.id.clone();
        let outcome = if request.tool == OBSERVE_TOOL {
            self.observe()
        } else if self.actions.iter().any(|a| *a == request.tool) {
            Ok(json!({
                "action": {
                    "action_id": request.tool,
                    "parameters": request.parameters,
                }
            }))
        } else {
            Err(anyhow::anyhow!("Unknown tool: {}", request.tool))
        };

        match outcome {
            Ok(value) => ToolResponse {
                id,
                text: value.to_string(),
                is_error: false,
            },
            Err(e) => ToolResponse {
                id,
                text: e.to_string(),
                is_error: true,
            },
        }
    }

    fn observe(&self) -> Result<Value> {
        let path = self
            .snapshot
            .as_ref()
            .context("No live snapshot available for this session")?;
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let state: WorldState = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;

        Ok(json!({
            "world_id": self.world_id,
            "agent_position": state.agent_position,
            "width": state.width,
            "height": state.height,
            "inventory": state.inventory,
            "grid": state.render(),
        }))
    }
}

/// Serve JSON-line tool requests until the reader closes.
pub async fn serve<R, W>(worker: &ToolWorker, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read tool request")? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ToolRequest>(&line) {
            Ok(request) => {
                tracing::debug!(tool = %request.tool, "Tool request");
                worker.handle(request)
            }
            Err(e) => ToolResponse {
                id: None,
                text: format!("Malformed tool request: {e}"),
                is_error: true,
            },
        };
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }
    Ok(())
}
