//! Live, world-keyed snapshot store shared between a session and the
//! read-only tool calls its reasoning process makes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use microworld_actions::StateDelta;
use microworld_grid::{Position, WorldState, EMPTY_CELL};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no live snapshot for world `{0}`")]
    UnknownWorld(String),
    #[error("invalid `{field}` in delta: {reason}")]
    BadDelta { field: &'static str, reason: String },
    #[error("failed to mirror snapshot to {path}: {source}")]
    Mirror {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct Entry {
    state: WorldState,
    owner: Option<String>,
}

/// Handle to the shared world snapshots. Clones share the same data.
///
/// When a mirror directory is set, every write is also persisted as
/// `<dir>/<world_id>.json` so out-of-process tool workers can read it.
#[derive(Debug, Clone, Default)]
pub struct WorldStateStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
    mirror_dir: Option<PathBuf>,
}

impl WorldStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mirror(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::default(),
            mirror_dir: Some(dir.into()),
        }
    }

    /// Path of the mirrored snapshot for a world, if mirroring is on.
    pub fn mirror_path(&self, world_id: &str) -> Option<PathBuf> {
        self.mirror_dir
            .as_ref()
            .map(|dir| dir.join(format!("{world_id}.json")))
    }

    pub fn get(&self, world_id: &str) -> Option<WorldState> {
        self.read().get(world_id).map(|e| e.state.clone())
    }

    pub fn set(&self, world_id: &str, state: WorldState) -> Result<(), StoreError> {
        let mut map = self.write();
        let entry = map.entry(world_id.to_string()).or_insert_with(|| Entry {
            state: state.clone(),
            owner: None,
        });
        entry.state = state;
        self.mirror(world_id, &entry.state)
    }

    pub fn update_position(&self, world_id: &str, position: Position) -> Result<(), StoreError> {
        self.modify(world_id, |state| {
            state.agent_position = position;
            Ok(())
        })
    }

    /// Fold a successful action's delta into the snapshot.
    ///
    /// Understands `agent_position`, `cell_cleared` and `inventory_added`;
    /// other keys carry no snapshot state and are ignored.
    pub fn apply_delta(&self, world_id: &str, delta: &StateDelta) -> Result<(), StoreError> {
        self.modify(world_id, |state| {
            if let Some(value) = delta.get("agent_position") {
                state.agent_position = position_field("agent_position", value)?;
            }
            if let Some(value) = delta.get("cell_cleared") {
                let pos = position_field("cell_cleared", value)?;
                let cell = state.cell_mut(pos).ok_or_else(|| StoreError::BadDelta {
                    field: "cell_cleared",
                    reason: format!("{pos} is outside the grid"),
                })?;
                *cell = EMPTY_CELL.to_string();
            }
            if let Some(value) = delta.get("inventory_added") {
                let item = value.as_str().ok_or_else(|| StoreError::BadDelta {
                    field: "inventory_added",
                    reason: "expected a string".into(),
                })?;
                state.inventory.push(item.to_string());
            }
            Ok(())
        })
    }

    /// Record `session_id` as the writer for a world and return the
    /// previous owner, if any.
    pub fn claim(&self, world_id: &str, session_id: &str) -> Option<String> {
        let mut map = self.write();
        let entry = map.get_mut(world_id)?;
        entry.owner.replace(session_id.to_string())
    }

    /// Drop the snapshot if `session_id` still owns it.
    pub fn release(&self, world_id: &str, session_id: &str) {
        let mut map = self.write();
        let owned = map
            .get(world_id)
            .is_some_and(|e| e.owner.as_deref() == Some(session_id));
        if owned {
            map.remove(world_id);
            if let Some(path) = self.mirror_path(world_id) {
                let _ = std::fs::remove_file(path);
            }
        }
    }

    pub fn owner(&self, world_id: &str) -> Option<String> {
        self.read().get(world_id).and_then(|e| e.owner.clone())
    }

    fn modify(
        &self,
        world_id: &str,
        f: impl FnOnce(&mut WorldState) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut map = self.write();
        let entry = map
            .get_mut(world_id)
            .ok_or_else(|| StoreError::UnknownWorld(world_id.to_string()))?;
        let mut next = entry.state.clone();
        f(&mut next)?;
        entry.state = next;
        self.mirror(world_id, &entry.state)
    }

    fn mirror(&self, world_id: &str, state: &WorldState) -> Result<(), StoreError> {
        let Some(path) = self.mirror_path(world_id) else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&path, &json).map_err(|source| StoreError::Mirror { path, source })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn position_field(field: &'static str, value: &serde_json::Value) -> Result<Position, StoreError> {
    serde_json::from_value(value.clone()).map_err(|e| StoreError::BadDelta {
        field,
        reason: e.to_string(),
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(value: serde_json::Value) -> StateDelta {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn apply_delta_moves_agent_and_clears_cells() {
        let store = WorldStateStore::new();
        let mut world = WorldState::open(3, 3, Position::new(1, 1)).unwrap();
        world.grid[1][1] = "gem".into();
        store.set("w1", world).unwrap();

        store
            .apply_delta("w1", &delta(json!({"inventory_added": "gem", "cell_cleared": [1, 1]})))
            .unwrap();
        store
            .apply_delta("w1", &delta(json!({"agent_position": [2, 1], "agent_moved_from": [1, 1]})))
            .unwrap();

        let state = store.get("w1").unwrap();
        assert_eq!(state.agent_position, Position::new(2, 1));
        assert_eq!(state.grid[1][1], EMPTY_CELL);
        assert_eq!(state.inventory, vec!["gem".to_string()]);
    }

    #[test]
    fn bad_delta_leaves_snapshot_untouched() {
        let store = WorldStateStore::new();
        store
            .set("w1", WorldState::open(2, 2, Position::new(0, 0)).unwrap())
            .unwrap();

        let err = store
            .apply_delta("w1", &delta(json!({"agent_position": [1, 1], "cell_cleared": [9, 9]})))
            .unwrap_err();
        assert!(matches!(err, StoreError::BadDelta { field: "cell_cleared", .. }));
        assert_eq!(store.get("w1").unwrap().agent_position, Position::new(0, 0));

        assert!(matches!(
            store.update_position("nope", Position::new(0, 0)),
            Err(StoreError::UnknownWorld(_))
        ));
    }

    #[test]
    fn worlds_are_isolated_and_released_by_owner_only() {
        let store = WorldStateStore::new();
        store
            .set("a", WorldState::open(2, 2, Position::new(0, 0)).unwrap())
            .unwrap();
        store
            .set("b", WorldState::open(2, 2, Position::new(1, 1)).unwrap())
            .unwrap();

        assert_eq!(store.claim("a", "s1"), None);
        assert_eq!(store.claim("a", "s2"), Some("s1".to_string()));

        store.update_position("a", Position::new(1, 0)).unwrap();
        assert_eq!(store.get("b").unwrap().agent_position, Position::new(1, 1));

        store.release("a", "s1");
        assert!(store.get("a").is_some());
        store.release("a", "s2");
        assert!(store.get("a").is_none());
    }

    #[test]
    fn mirror_writes_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStateStore::with_mirror(dir.path());
        store
            .set("w1", WorldState::open(2, 2, Position::new(0, 1)).unwrap())
            .unwrap();

        let path = store.mirror_path("w1").unwrap();
        let on_disk: WorldState =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.agent_position, Position::new(0, 1));

        store.claim("w1", "s1");
        store.release("w1", "s1");
        assert!(!path.exists());
    }
}
