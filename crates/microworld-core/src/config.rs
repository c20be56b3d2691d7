//! Deployment configuration loading and management.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main deployment configuration, loaded from .microworld/config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Config version
    pub version: Option<String>,

    /// Directory holding one world file per world id
    #[serde(default = "default_worlds_dir")]
    pub worlds_dir: PathBuf,

    /// Directory for per-session event logs
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,

    /// Where live world snapshots are mirrored for the tool worker.
    /// `None` keeps them in memory only.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: Option<PathBuf>,

    /// Capacity of the event channel between session and consumer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Item token recorded by `pickup` when none is given
    #[serde(default = "default_item")]
    pub default_item: String,

    /// External reasoning process
    #[serde(default = "default_reasoning")]
    pub reasoning: ProcessSpec,

    /// Tool-execution worker handed to the reasoning process
    #[serde(default = "default_tool_worker")]
    pub tool_worker: ProcessSpec,

    /// Per-agent tool allow-lists; agents not listed get every tool
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
}

/// A command line to spawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ProcessSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool names this agent may use
    #[serde(default)]
    pub tools: Vec<String>,
}

fn default_worlds_dir() -> PathBuf {
    PathBuf::from(".microworld/worlds")
}
fn default_runs_dir() -> PathBuf {
    PathBuf::from(".microworld/runs")
}
fn default_snapshot_dir() -> Option<PathBuf> {
    Some(PathBuf::from(".microworld/snapshots"))
}
fn default_event_buffer() -> usize {
    64
}
fn default_item() -> String {
    microworld_grid::DEFAULT_ITEM.to_string()
}
fn default_reasoning() -> ProcessSpec {
    ProcessSpec::new("microworld-agent")
}
fn default_tool_worker() -> ProcessSpec {
    ProcessSpec::new("microworld").arg("tool-worker")
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            version: None,
            worlds_dir: default_worlds_dir(),
            runs_dir: default_runs_dir(),
            snapshot_dir: default_snapshot_dir(),
            event_buffer: default_event_buffer(),
            default_item: default_item(),
            reasoning: default_reasoning(),
            tool_worker: default_tool_worker(),
            agents: BTreeMap::new(),
        }
    }
}

impl DeployConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Load from project root (looks for .microworld/config.yaml)
    pub fn load_from_project(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".microworld/config.yaml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve paths relative to project root
    pub fn resolve_paths(&mut self, project_root: &Path) {
        self.worlds_dir = project_root.join(&self.worlds_dir);
        self.runs_dir = project_root.join(&self.runs_dir);
        if let Some(dir) = self.snapshot_dir.take() {
            self.snapshot_dir = Some(project_root.join(dir));
        }
    }

    /// Tool allow-list for an agent, if one is configured
    pub fn agent_tools(&self, agent_id: &str) -> Option<&[String]> {
        self.agents.get(agent_id).map(|a| a.tools.as_slice())
    }
}
