//! World sources the pipeline loads a session's starting world from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use microworld_grid::WorldState;
use serde::{Deserialize, Serialize};

/// A stored world: its game type plus the grid state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub game_type: String,
    #[serde(flatten)]
    pub state: WorldState,
}

impl WorldSnapshot {
    pub fn new(game_type: impl Into<String>, state: WorldState) -> Self {
        Self {
            game_type: game_type.into(),
            state,
        }
    }
}

/// Source of world snapshots.
#[async_trait]
pub trait WorldStore: Send + Sync {
    /// Fetch a world, `Ok(None)` when no such world exists.
    async fn get_world(&self, world_id: &str) -> Result<Option<WorldSnapshot>>;
}

/// Worlds held in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorldStore {
    worlds: RwLock<HashMap<String, WorldSnapshot>>,
}

impl InMemoryWorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, world_id: impl Into<String>, snapshot: WorldSnapshot) {
        self.worlds
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(world_id.into(), snapshot);
    }

    pub fn with_world(self, world_id: impl Into<String>, snapshot: WorldSnapshot) -> Self {
        self.insert(world_id, snapshot);
        self
    }
}

#[async_trait]
impl WorldStore for InMemoryWorldStore {
    async fn get_world(&self, world_id: &str) -> Result<Option<WorldSnapshot>> {
        let worlds = self.worlds.read().unwrap_or_else(|e| e.into_inner());
        Ok(worlds.get(world_id).cloned())
    }
}

/// One world per file under a directory, keyed by file stem.
///
/// `<id>.yaml`, `<id>.yml` and `<id>.json` are tried in that order.
#[derive(Debug, Clone)]
pub struct FileWorldStore {
    dir: PathBuf,
}

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

impl FileWorldStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List world ids available in the directory.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| EXTENSIONS.contains(&e))
            })
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn path_for(&self, world_id: &str) -> Option<PathBuf> {
        if world_id.is_empty()
            || world_id.starts_with('.')
            || world_id.contains(['/', '\\'])
        {
            return None;
        }
        EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{world_id}.{ext}")))
            .find(|p| p.exists())
    }
}

#[async_trait]
impl WorldStore for FileWorldStore {
    async fn get_world(&self, world_id: &str) -> Result<Option<WorldSnapshot>> {
        let Some(path) = self.path_for(world_id) else {
            return Ok(None);
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read world {}", path.display()))?;

        let snapshot = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse world {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse world {}", path.display()))?
        };

        tracing::debug!(world_id, path = %path.display(), "Loaded world");
        Ok(Some(snapshot))
    }
}
