//! Process adapter - runs the reasoning process as a child speaking JSON lines.

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{AgentMessage, ReasoningLauncher, ReasoningProcess};
use crate::config::ProcessSpec;
use crate::worker::ToolWorkerSpec;

/// Environment variable carrying the tool worker descriptor as JSON.
pub const TOOL_WORKER_ENV: &str = "MICROWORLD_TOOL_WORKER";

/// Launches the configured command for every session.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    spec: ProcessSpec,
}

impl ProcessLauncher {
    pub fn new(spec: ProcessSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl ReasoningLauncher for ProcessLauncher {
    async fn launch(&self, worker: &ToolWorkerSpec) -> Result<Box<dyn ReasoningProcess>> {
        let process = ProcessReasoning::spawn(&self.spec, worker)?;
        Ok(Box::new(process))
    }
}

/// A reasoning child process.
///
/// The prompt is written to stdin, which is then closed. Each stdout line is
/// one JSON [`AgentMessage`]; end of output is completion. The child is
/// killed if this value is dropped before it exits.
pub struct ProcessReasoning {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
    finished: bool,
}

impl ProcessReasoning {
    pub fn spawn(spec: &ProcessSpec, worker: &ToolWorkerSpec) -> Result<Self> {
        tracing::info!(
            command = %spec.command,
            worker = %worker.command,
            "Spawning reasoning process"
        );

        let worker_json =
            serde_json::to_string(worker).context("Failed to encode tool worker descriptor")?;

        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .envs(&spec.env)
            .env(TOOL_WORKER_ENV, worker_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn reasoning process `{}`", spec.command))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .context("Reasoning process has no stdout")?;

        Ok(Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            finished: false,
        })
    }
}

#[async_trait]
impl ReasoningProcess for ProcessReasoning {
    async fn submit(&mut self, prompt: &str) -> Result<()> {
        let mut stdin = self
            .stdin
            .take()
            .context("Prompt already submitted to reasoning process")?;
        stdin
            .write_all(prompt.as_bytes())
            .await
            .context("Failed to write prompt")?;
        stdin.shutdown().await.context("Failed to close prompt stream")?;
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<AgentMessage>> {
        if self.finished {
            return Ok(None);
        }

        while let Some(line) = self
            .lines
            .next_line()
            .await
            .context("Failed to read reasoning output")?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let message = serde_json::from_str(line)
                .with_context(|| format!("Malformed reasoning message: {line}"))?;
            return Ok(Some(message));
        }

        self.finished = true;
        let status = self
            .child
            .wait()
            .await
            .context("Failed to wait for reasoning process")?;
        if !status.success() {
            anyhow::bail!("Reasoning process exited with {status}");
        }
        Ok(None)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::adapters::ContentBlock;

    fn shell(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh").arg("-c").arg(script)
    }

    fn worker() -> ToolWorkerSpec {
        ToolWorkerSpec::for_session(&ProcessSpec::new("true"), "s1", "w1", &["move"], None)
    }

    #[tokio::test]
    async fn reads_messages_until_exit() {
        let spec = shell(
            r#"read -r goal; echo '{"type":"system","text":"got '"$goal"'"}';
               echo "";
               echo '{"type":"assistant","content":[{"type":"text","text":"hi"}]}';
               echo '{"type":"result","stop_reason":"end_turn"}'"#,
        );
        let mut process = ProcessReasoning::spawn(&spec, &worker()).unwrap();
        process.submit("north\n").await.unwrap();

        assert_eq!(
            process.next_message().await.unwrap(),
            Some(AgentMessage::system("got north"))
        );
        assert_eq!(
            process.next_message().await.unwrap(),
            Some(AgentMessage::assistant(vec![ContentBlock::text("hi")]))
        );
        assert_eq!(
            process.next_message().await.unwrap(),
            Some(AgentMessage::stop("end_turn"))
        );
        assert_eq!(process.next_message().await.unwrap(), None);
        assert_eq!(process.next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn worker_descriptor_is_passed_in_env() {
        let spec = shell(r#"cat >/dev/null; printf '{"type":"system","text":"%s"}\n' "$(echo "$MICROWORLD_TOOL_WORKER" | tr -d '"')""#);
        let mut process = ProcessReasoning::spawn(&spec, &worker()).unwrap();
        process.submit("").await.unwrap();

        let Some(AgentMessage::System { text }) = process.next_message().await.unwrap() else {
            panic!("expected a system message");
        };
        assert!(text.contains("MICROWORLD_WORLD_ID:w1"), "{text}");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let mut process =
            ProcessReasoning::spawn(&shell("cat >/dev/null; exit 3"), &worker()).unwrap();
        process.submit("go").await.unwrap();
        assert!(process.next_message().await.is_err());
    }

    #[tokio::test]
    async fn malformed_line_is_an_error() {
        let mut process =
            ProcessReasoning::spawn(&shell("cat >/dev/null; echo nope"), &worker()).unwrap();
        process.submit("go").await.unwrap();
        assert!(process.next_message().await.is_err());
    }

    #[test]
    fn missing_command_fails_to_spawn() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let spec = ProcessSpec::new("microworld-no-such-agent-binary");
        assert!(ProcessReasoning::spawn(&spec, &worker()).is_err());
    }
}
