//! Engine registry - selects an action engine by game type.

use std::collections::HashMap;

use microworld_actions::{ActionCatalog, ActionEngine, ActionSchema, CatalogError};
use microworld_grid::{GridNavigationEngine, WorldError, WorldState};
use thiserror::Error;

use crate::config::DeployConfig;
use crate::state::WorldSnapshot;

#[derive(Debug, Error)]
pub enum EngineInitError {
    #[error("unsupported game type `{0}`")]
    UnsupportedGameType(String),
    #[error("invalid world: {0}")]
    InvalidWorld(#[from] WorldError),
}

type EngineFactory =
    Box<dyn Fn(WorldState, Vec<ActionSchema>) -> Box<dyn ActionEngine> + Send + Sync>;

/// Action catalog plus one engine constructor per game type.
pub struct EngineRegistry {
    catalog: ActionCatalog,
    factories: HashMap<String, EngineFactory>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            catalog: ActionCatalog::new(),
            factories: HashMap::new(),
        }
    }

    /// Registry with the grid navigation engine, sealed.
    pub fn with_defaults(config: &DeployConfig) -> Result<Self, CatalogError> {
        let default_item = config.default_item.clone();
        let mut registry = Self::new();
        registry.register(
            microworld_grid::GAME_TYPE,
            microworld_grid::schemas(),
            move |world, schemas| {
                Box::new(
                    GridNavigationEngine::with_schemas(world, schemas)
                        .with_default_item(default_item.clone()),
                )
            },
        )?;
        registry.seal();
        Ok(registry)
    }

    pub fn register<F>(
        &mut self,
        game_type: &str,
        schemas: Vec<ActionSchema>,
        factory: F,
    ) -> Result<(), CatalogError>
    where
        F: Fn(WorldState, Vec<ActionSchema>) -> Box<dyn ActionEngine> + Send + Sync + 'static,
    {
        for schema in schemas {
            self.catalog.register(game_type, schema)?;
        }
        self.factories.insert(game_type.to_string(), Box::new(factory));
        Ok(())
    }

    pub fn seal(&mut self) {
        self.catalog.seal();
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// Validate the snapshot and build the engine for its game type.
    pub fn create(
        &self,
        snapshot: &WorldSnapshot,
    ) -> Result<(Box<dyn ActionEngine>, WorldState), EngineInitError> {
        let factory = self
            .factories
            .get(&snapshot.game_type)
            .ok_or_else(|| EngineInitError::UnsupportedGameType(snapshot.game_type.clone()))?;
        let schemas = self
            .catalog
            .actions(&snapshot.game_type)
            .map(<[ActionSchema]>::to_vec)
            .unwrap_or_default();

        let mut world = WorldState::from_parts(
            snapshot.state.grid.clone(),
            snapshot.state.agent_position,
            snapshot.state.width,
            snapshot.state.height,
        )?;
        world.inventory = snapshot.state.inventory.clone();

        let engine = factory(world.clone(), schemas);
        Ok((engine, world))
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
