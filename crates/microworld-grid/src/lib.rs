//! Grid navigation microworld.
//!
//! A rectangular grid of cell tokens with a single agent. The engine exposes
//! `move`, `pickup` and `wait` through the `microworld-actions` contract.

#![forbid(unsafe_code)]

pub mod engine;
pub mod world;

pub use engine::{schemas, GridNavigationEngine, DEFAULT_ITEM, GAME_TYPE};
pub use world::{Direction, Position, WorldError, WorldState, EMPTY_CELL};
