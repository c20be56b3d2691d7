use serde_json::Value;
use thiserror::Error;

use crate::{ActionResult, ActionSchema, Params};

/// A fault raised while running a concrete action routine.
///
/// Distinct from a failed [`ActionResult`]: validation and rule failures are
/// ordinary results, a fault means the engine itself could not proceed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFault {
    #[error("world state is inconsistent: {0}")]
    CorruptState(String),
    #[error("{0}")]
    Internal(String),
}

/// Validates parameters against a schema and dispatches to a concrete routine.
pub trait ActionEngine: Send {
    /// Game type this engine implements, e.g. `grid_navigation`.
    fn game_type(&self) -> &str;

    /// Schemas this engine accepts.
    fn schemas(&self) -> &[ActionSchema];

    /// Run an already-validated action. `params` has defaults filled in.
    fn perform(&mut self, action_id: &str, params: &Params) -> Result<ActionResult, ActionFault>;

    /// Serialized copy of the engine's current world, `Null` if it has none.
    fn snapshot(&self) -> Value {
        Value::Null
    }

    fn schema(&self, action_id: &str) -> Option<&ActionSchema> {
        self.schemas().iter().find(|s| s.action_id == action_id)
    }

    /// Resolve, validate, fill defaults, then perform.
    ///
    /// Every rejection is returned as a failed [`ActionResult`]; `Err` is
    /// reserved for faults raised by [`ActionEngine::perform`].
    fn execute(&mut self, action_id: &str, params: Params) -> Result<ActionResult, ActionFault> {
        let Some(schema) = self.schema(action_id) else {
            return Ok(ActionResult::unknown_action(action_id));
        };
        let params = match validate(schema, params) {
            Ok(params) => params,
            Err(error) => return Ok(ActionResult::invalid_params(error)),
        };
        self.perform(action_id, &params)
    }
}

/// Check `params` against `schema` and fill defaults for absent optionals.
///
/// Returns the error text for the first violation found. Required parameters
/// are checked before types, both in declaration order.
pub fn validate(schema: &ActionSchema, mut params: Params) -> Result<Params, String> {
    for param in schema.parameters.iter().filter(|p| p.required) {
        if params.get(&param.name).map_or(true, |v| v.is_null()) {
            return Err(format!("Missing required parameter: {}", param.name));
        }
    }

    for param in &schema.parameters {
        let Some(value) = params.get(&param.name).filter(|v| !v.is_null()) else {
            continue;
        };
        if !param.param_type.accepts(value) {
            return Err(format!(
                "Parameter '{}' {}",
                param.name,
                param.param_type.mismatch()
            ));
        }
        let n = value.as_i64().or_else(|| value.is_u64().then_some(i64::MAX));
        if let (Some(min), Some(n)) = (param.minimum, n) {
            if n < min {
                return Err(format!("Parameter '{}' must be at least {}", param.name, min));
            }
        }
    }

    for param in &schema.parameters {
        let absent = params.get(&param.name).map_or(true, |v| v.is_null());
        if absent {
            match &param.default {
                Some(default) => {
                    params.insert(param.name.clone(), default.clone());
                }
                None => {
                    params.remove(&param.name);
                }
            }
        }
    }

    Ok(params)
}
