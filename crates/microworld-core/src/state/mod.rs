//! State - world sources, tool definitions, and the live world snapshot store.

mod shared;
mod tools;
mod world_store;

pub use shared::{StoreError, WorldStateStore};
pub use tools::{CatalogToolStore, ToolDefinition, ToolStore, OBSERVE_TOOL};
pub use world_store::{FileWorldStore, InMemoryWorldStore, WorldSnapshot, WorldStore};
