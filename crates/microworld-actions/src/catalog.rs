use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ActionSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("action `{action_id}` already registered for game type `{game_type}`")]
    DuplicateAction { game_type: String, action_id: String },
    #[error("catalog is sealed; no registrations after a session begins")]
    Sealed,
}

/// Action schemas grouped by game type.
///
/// Built once per session; `seal` freezes it before the first action runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionCatalog {
    games: BTreeMap<String, Vec<ActionSchema>>,
    #[serde(skip)]
    sealed: bool,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        game_type: impl Into<String>,
        schema: ActionSchema,
    ) -> Result<(), CatalogError> {
        if self.sealed {
            return Err(CatalogError::Sealed);
        }
        let game_type = game_type.into();
        let schemas = self.games.entry(game_type.clone()).or_default();
        if schemas.iter().any(|s| s.action_id == schema.action_id) {
            return Err(CatalogError::DuplicateAction {
                game_type,
                action_id: schema.action_id,
            });
        }
        schemas.push(schema);
        Ok(())
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn lookup(&self, game_type: &str, action_id: &str) -> Option<&ActionSchema> {
        self.actions(game_type)?
            .iter()
            .find(|s| s.action_id == action_id)
    }

    pub fn actions(&self, game_type: &str) -> Option<&[ActionSchema]> {
        self.games.get(game_type).map(Vec::as_slice)
    }

    pub fn game_types(&self) -> impl Iterator<Item = &str> {
        self.games.keys().map(String::as_str)
    }
}
