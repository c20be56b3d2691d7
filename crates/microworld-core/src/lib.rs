//! Microworld Core - deploys an agent into a world.
//!
//! A deployment launches an external reasoning process, relays its output
//! as typed [`DeploymentEvent`]s, and executes the actions it requests
//! against the world's action engine. Live world state is published through
//! a shared [`WorldStateStore`] that tool workers read back.

pub mod adapters;
pub mod config;
pub mod observability;
pub mod pipeline;
pub mod state;
pub mod worker;

pub use config::DeployConfig;
pub use observability::EventLog;
pub use pipeline::{
    DeploymentEvent, DeploymentPipeline, DeploymentRequest, DeploymentSession, EngineRegistry,
    ErrorCode, EventType,
};
pub use state::{WorldSnapshot, WorldStateStore};
