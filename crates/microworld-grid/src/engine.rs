use microworld_actions::{
    ActionEngine, ActionFault, ActionParameter, ActionResult, ActionSchema, ParamType, Params,
    StateDelta,
};
use serde_json::{json, Value};

use crate::world::{Direction, Position, WorldState, EMPTY_CELL};

/// Game type key for the grid navigation microworld.
pub const GAME_TYPE: &str = "grid_navigation";

/// Item recorded by `pickup` when no `item_type` is given.
pub const DEFAULT_ITEM: &str = "item";

/// Schemas for `move`, `pickup` and `wait`.
pub fn schemas() -> Vec<ActionSchema> {
    vec![
        ActionSchema::new("move", "Move")
            .with_description("Move the agent in a cardinal direction; stops at the grid edge")
            .with_param(
                ActionParameter::required("direction", ParamType::String)
                    .with_description("One of north, south, east, west"),
            )
            .with_param(
                ActionParameter::optional("steps", ParamType::Integer, Some(json!(1)))
                    .with_minimum(1)
                    .with_description("Number of cells to move"),
            ),
        ActionSchema::new("pickup", "Pick up")
            .with_description("Pick up whatever is on the agent's cell")
            .with_param(
                ActionParameter::optional("item_type", ParamType::String, None)
                    .with_description("Kind of item being picked up"),
            ),
        ActionSchema::new("wait", "Wait")
            .with_description("Let turns pass without moving")
            .with_param(
                ActionParameter::optional("turns", ParamType::Integer, Some(json!(1)))
                    .with_minimum(1)
                    .with_description("Number of turns to wait"),
            ),
    ]
}

/// Concrete engine over a single [`WorldState`].
///
/// Moves clamp to the grid instead of failing, so every well-formed request
/// produces a result; touching the edge is reported in the message.
#[derive(Debug, Clone)]
pub struct GridNavigationEngine {
    world: WorldState,
    schemas: Vec<ActionSchema>,
    default_item: String,
}

impl GridNavigationEngine {
    pub fn new(world: WorldState) -> Self {
        Self::with_schemas(world, schemas())
    }

    /// Use schemas taken from a session catalog.
    pub fn with_schemas(world: WorldState, schemas: Vec<ActionSchema>) -> Self {
        Self {
            world,
            schemas,
            default_item: DEFAULT_ITEM.to_string(),
        }
    }

    pub fn with_default_item(mut self, item: impl Into<String>) -> Self {
        self.default_item = item.into();
        self
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    fn current_position(&self) -> Result<Position, ActionFault> {
        let pos = self.world.agent_position;
        if !self.world.in_bounds(pos) {
            return Err(ActionFault::CorruptState(format!(
                "agent at {pos} outside {}x{} grid",
                self.world.width, self.world.height
            )));
        }
        Ok(pos)
    }

    fn move_agent(&mut self, params: &Params) -> Result<ActionResult, ActionFault> {
        let raw = params.get("direction").and_then(Value::as_str).unwrap_or_default();
        let Some(direction) = Direction::parse(raw) else {
            let message = format!("Invalid direction: {raw}");
            return Ok(ActionResult::fail(message.clone(), message));
        };
        let steps = saturating_int(params.get("steps")).unwrap_or(1);

        let start = self.current_position()?;
        let (dx, dy) = direction.unit();
        let target = Position::new(
            start.x.saturating_add(dx.saturating_mul(steps)),
            start.y.saturating_add(dy.saturating_mul(steps)),
        );
        let end = self.world.clamp(target);

        if end == start {
            return Ok(ActionResult::unchanged(format!(
                "Cannot move {}: blocked by boundary at {start}",
                direction.name()
            )));
        }

        self.world.agent_position = end;
        tracing::debug!(from = %start, to = %end, direction = direction.name(), "agent moved");

        let mut delta = StateDelta::new();
        delta.insert("agent_position".into(), position_value(end));
        delta.insert("agent_moved_from".into(), position_value(start));
        delta.insert("agent_moved_to".into(), position_value(end));

        let message = if end == target {
            format!("Moved {} to {end}", direction.name())
        } else {
            format!("Moved {} to {end}, stopped at boundary", direction.name())
        };
        Ok(ActionResult::ok(delta, message))
    }

    fn pickup(&mut self, params: &Params) -> Result<ActionResult, ActionFault> {
        let pos = self.current_position()?;
        let item = params
            .get("item_type")
            .and_then(Value::as_str)
            .unwrap_or(&self.default_item)
            .to_string();

        let cell = self
            .world
            .cell_mut(pos)
            .ok_or_else(|| ActionFault::CorruptState(format!("no cell at {pos}")))?;
        *cell = EMPTY_CELL.to_string();
        self.world.inventory.push(item.clone());

        let mut delta = StateDelta::new();
        delta.insert("inventory_added".into(), Value::String(item.clone()));
        delta.insert("cell_cleared".into(), position_value(pos));
        Ok(ActionResult::ok(delta, format!("Picked up {item} at {pos}")))
    }

    fn wait(&mut self, params: &Params) -> Result<ActionResult, ActionFault> {
        let turns = params
            .get("turns")
            .filter(|v| v.is_i64() || v.is_u64())
            .cloned()
            .unwrap_or_else(|| json!(1));
        let mut delta = StateDelta::new();
        delta.insert("turns_waited".into(), json!(turns));
        Ok(ActionResult::ok(delta, format!("Waited {turns} turn(s)")))
    }
}

impl ActionEngine for GridNavigationEngine {
    fn game_type(&self) -> &str {
        GAME_TYPE
    }

    fn schemas(&self) -> &[ActionSchema] {
        &self.schemas
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(&self.world).unwrap_or(Value::Null)
    }

    fn perform(&mut self, action_id: &str, params: &Params) -> Result<ActionResult, ActionFault> {
        match action_id {
            "move" => self.move_agent(params),
            "pickup" => self.pickup(params),
            "wait" => self.wait(params),
            other => Ok(ActionResult::unknown_action(other)),
        }
    }
}

/// Integer value, with anything above `i64::MAX` pinned to it.
fn saturating_int(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value.as_i64().or_else(|| value.is_u64().then_some(i64::MAX))
}

fn position_value(p: Position) -> Value {
    json!([p.x, p.y])
}
