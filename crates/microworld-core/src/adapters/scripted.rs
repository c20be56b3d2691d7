//! Scripted adapter - replays a fixed message sequence.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{AgentMessage, ReasoningLauncher, ReasoningProcess};
use crate::worker::ToolWorkerSpec;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Message(AgentMessage),
    /// The process fails at this point.
    Fail(String),
}

/// Hands out [`ScriptedReasoning`] processes replaying the same script.
///
/// Prompts and worker descriptors seen by launched processes are recorded
/// for inspection.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    script: Vec<ScriptStep>,
    prompts: Arc<Mutex<Vec<String>>>,
    workers: Arc<Mutex<Vec<ToolWorkerSpec>>>,
}

impl ScriptedLauncher {
    pub fn new(messages: impl IntoIterator<Item = AgentMessage>) -> Self {
        Self {
            script: messages.into_iter().map(ScriptStep::Message).collect(),
            ..Self::default()
        }
    }

    pub fn then_fail(mut self, error: impl Into<String>) -> Self {
        self.script.push(ScriptStep::Fail(error.into()));
        self
    }

    /// Load a transcript with one JSON message per line.
    pub fn from_jsonl(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        let mut messages = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let message: AgentMessage = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: bad message", path.display(), n + 1))?;
            messages.push(message);
        }
        Ok(Self::new(messages))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn workers(&self) -> Vec<ToolWorkerSpec> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ReasoningLauncher for ScriptedLauncher {
    async fn launch(&self, worker: &ToolWorkerSpec) -> Result<Box<dyn ReasoningProcess>> {
        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(worker.clone());
        Ok(Box::new(ScriptedReasoning {
            steps: self.script.iter().cloned().collect(),
            prompts: Arc::clone(&self.prompts),
            submitted: false,
        }))
    }
}

/// One replay of a script.
#[derive(Debug)]
pub struct ScriptedReasoning {
    steps: VecDeque<ScriptStep>,
    prompts: Arc<Mutex<Vec<String>>>,
    submitted: bool,
}

#[async_trait]
impl ReasoningProcess for ScriptedReasoning {
    async fn submit(&mut self, prompt: &str) -> Result<()> {
        if self.submitted {
            anyhow::bail!("Prompt already submitted");
        }
        self.submitted = true;
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<AgentMessage>> {
        if !self.submitted {
            anyhow::bail!("No prompt submitted");
        }
        match self.steps.pop_front() {
            Some(ScriptStep::Message(message)) => Ok(Some(message)),
            Some(ScriptStep::Fail(error)) => {
                self.steps.clear();
                Err(anyhow::anyhow!(error))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessSpec;

    fn worker() -> ToolWorkerSpec {
        ToolWorkerSpec::for_session(&ProcessSpec::new("true"), "s1", "w1", &[], None)
    }

    #[test]
    fn replays_script_and_records_prompt() {
        let launcher = ScriptedLauncher::new([AgentMessage::system("hello")]);
        let mut process = tokio_test::block_on(launcher.launch(&worker())).unwrap();

        assert!(tokio_test::block_on(process.next_message()).is_err());
        tokio_test::block_on(process.submit("the goal")).unwrap();
        assert!(tokio_test::block_on(process.submit("again")).is_err());

        assert_eq!(
            tokio_test::block_on(process.next_message()).unwrap(),
            Some(AgentMessage::system("hello"))
        );
        assert_eq!(tokio_test::block_on(process.next_message()).unwrap(), None);
        assert_eq!(launcher.prompts(), vec!["the goal".to_string()]);
        assert_eq!(launcher.workers()[0].env["MICROWORLD_WORLD_ID"], "w1");
    }

    #[test]
    fn failure_step_ends_the_script() {
        let launcher = ScriptedLauncher::new([]).then_fail("boom");
        let mut process = tokio_test::block_on(launcher.launch(&worker())).unwrap();
        tokio_test::block_on(process.submit("go")).unwrap();

        let err = tokio_test::block_on(process.next_message()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(tokio_test::block_on(process.next_message()).unwrap(), None);
    }

    #[test]
    fn loads_jsonl_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        std::fs::write(
            &path,
            "{\"type\":\"system\",\"text\":\"a\"}\n\n{\"type\":\"result\",\"stop_reason\":\"end_turn\"}\n",
        )
        .unwrap();

        let launcher = ScriptedLauncher::from_jsonl(&path).unwrap();
        assert_eq!(launcher.script.len(), 2);

        std::fs::write(&path, "{\"type\":\"bogus\"}\n").unwrap();
        let err = ScriptedLauncher::from_jsonl(&path).unwrap_err();
        assert!(format!("{err:#}").contains(":1: bad message"));
    }
}
