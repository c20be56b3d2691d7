//! Observability - per-session event logs.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::pipeline::DeploymentEvent;

/// Appends a session's events to `<runs_dir>/<session_id>.jsonl`.
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(runs_dir: &Path, session_id: &str) -> Result<Self> {
        if session_id.is_empty()
            || !session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!("invalid session id `{session_id}`");
        }
        Ok(Self {
            path: runs_dir.join(format!("{session_id}.jsonl")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event.
    pub fn record(&self, event: &DeploymentEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = serde_json::to_string(event)?;
        writeln!(file, "{}", line)?;

        Ok(())
    }

    /// Last `limit` events; unreadable lines are skipped.
    pub fn read_recent(&self, limit: usize) -> Vec<DeploymentEvent> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        let reader = BufReader::new(file);
        let mut events: Vec<DeploymentEvent> = reader
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();

        if events.len() > limit {
            events.drain(0..events.len() - limit);
        }

        events
    }
}

/// Session ids with a log under `runs_dir`, sorted.
pub fn list_sessions(runs_dir: &Path) -> Result<Vec<String>> {
    if !runs_dir.exists() {
        return Ok(Vec::new());
    }
    let mut sessions = Vec::new();
    for entry in std::fs::read_dir(runs_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            sessions.push(stem.to_string());
        }
    }
    sessions.sort();
    Ok(sessions)
}
