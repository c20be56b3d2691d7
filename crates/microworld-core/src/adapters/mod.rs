//! Adapters - reasoning process integrations.

mod message;
mod process;
mod scripted;

use anyhow::Result;
use async_trait::async_trait;

use crate::worker::ToolWorkerSpec;

pub use message::{AgentMessage, ContentBlock, TextBlock};
pub use process::{ProcessLauncher, ProcessReasoning, TOOL_WORKER_ENV};
pub use scripted::{ScriptStep, ScriptedLauncher, ScriptedReasoning};

/// Starts reasoning processes, one per deployment session.
#[async_trait]
pub trait ReasoningLauncher: Send + Sync {
    /// Start a process that will run tools through `worker`.
    async fn launch(&self, worker: &ToolWorkerSpec) -> Result<Box<dyn ReasoningProcess>>;
}

/// A running reasoning process.
///
/// Its messages form a forward-only sequence; once it returns `Ok(None)`
/// or an error the process is spent and cannot be restarted.
#[async_trait]
pub trait ReasoningProcess: Send {
    /// Hand the process its prompt.
    async fn submit(&mut self, prompt: &str) -> Result<()>;

    /// Next message, `Ok(None)` once the process signals completion.
    async fn next_message(&mut self) -> Result<Option<AgentMessage>>;
}
