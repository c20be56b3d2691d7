//! Declarative action schemas and the validating action engine contract.
//!
//! A game type publishes its actions as [`ActionSchema`]s in an
//! [`ActionCatalog`]. Concrete engines implement [`ActionEngine::perform`];
//! the provided [`ActionEngine::execute`] does resolution, type checking and
//! default filling so engines only ever see well-formed parameters.

#![forbid(unsafe_code)]

pub mod catalog;
pub mod engine;
pub mod result;
pub mod schema;

pub use catalog::{ActionCatalog, CatalogError};
pub use engine::{validate, ActionEngine, ActionFault};
pub use result::{ActionResult, Params, StateDelta};
pub use schema::{ActionParameter, ActionSchema, ParamType};
