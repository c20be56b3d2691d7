use microworld_actions::{ActionEngine, Params};
use microworld_grid::{GridNavigationEngine, Position, WorldState, EMPTY_CELL};
use serde_json::{json, Value};

fn engine_at(width: usize, height: usize, x: i64, y: i64) -> GridNavigationEngine {
    let world = WorldState::open(width, height, Position::new(x, y)).expect("valid world");
    GridNavigationEngine::new(world)
}

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn move_north_updates_position_and_reports_endpoints() {
    let mut engine = engine_at(3, 3, 1, 1);
    let result = engine
        .execute("move", params(json!({"direction": "north"})))
        .unwrap();

    assert!(result.success());
    let delta = result.state_delta();
    assert_eq!(delta["agent_position"], json!([1, 0]));
    assert_eq!(delta["agent_moved_from"], json!([1, 1]));
    assert_eq!(delta["agent_moved_to"], json!([1, 0]));
    assert_eq!(engine.world().agent_position, Position::new(1, 0));
}

#[test]
fn move_into_boundary_succeeds_with_empty_delta() {
    let mut engine = engine_at(3, 3, 0, 0);
    let result = engine
        .execute("move", params(json!({"direction": "north"})))
        .unwrap();

    assert!(result.success());
    assert!(result.state_delta().is_empty());
    assert!(result.message().contains("boundary"));
    assert_eq!(engine.world().agent_position, Position::new(0, 0));
}

#[test]
fn multi_step_move_is_clamped() {
    // One row, three columns.
    let mut engine = engine_at(3, 1, 1, 0);
    let result = engine
        .execute("move", params(json!({"direction": "east", "steps": 5})))
        .unwrap();

    assert!(result.success());
    assert_eq!(result.state_delta()["agent_position"], json!([2, 0]));
    assert!(result.message().contains("boundary"));
}

#[test]
fn invalid_direction_fails() {
    let mut engine = engine_at(3, 3, 1, 1);
    let result = engine
        .execute("move", params(json!({"direction": "up"})))
        .unwrap();

    assert!(!result.success());
    assert_eq!(result.message(), "Invalid direction: up");
    assert!(result.state_delta().is_empty());
}

#[test]
fn move_requires_direction_and_integer_steps() {
    let mut engine = engine_at(3, 3, 1, 1);

    let result = engine.execute("move", Params::new()).unwrap();
    assert!(!result.success());
    assert!(result.error().unwrap().contains("direction"));

    let result = engine
        .execute("move", params(json!({"direction": "east", "steps": "two"})))
        .unwrap();
    assert!(!result.success());
    assert!(result.error().unwrap().contains("must be an integer"));

    let result = engine
        .execute("move", params(json!({"direction": "east", "steps": 0})))
        .unwrap();
    assert!(!result.success());
    assert_eq!(engine.world().agent_position, Position::new(1, 1));
}

#[test]
fn pickup_always_clears_the_starting_cell() {
    let mut grid = vec![vec![EMPTY_CELL.to_string(); 3]; 3];
    grid[2][1] = "key".to_string();
    let world = WorldState::new(grid, Position::new(1, 2)).unwrap();
    let mut engine = GridNavigationEngine::new(world);

    let result = engine
        .execute("pickup", params(json!({"item_type": "key"})))
        .unwrap();
    assert!(result.success());
    assert_eq!(result.state_delta()["inventory_added"], json!("key"));
    assert_eq!(result.state_delta()["cell_cleared"], json!([1, 2]));
    assert_eq!(engine.world().cell(Position::new(1, 2)), Some(EMPTY_CELL));
    assert_eq!(engine.world().inventory, vec!["key".to_string()]);

    // Nothing left, still succeeds with the default token.
    let result = engine.execute("pickup", Params::new()).unwrap();
    assert!(result.success());
    assert_eq!(result.state_delta()["inventory_added"], json!("item"));
    assert_eq!(result.state_delta()["cell_cleared"], json!([1, 2]));
}

#[test]
fn wait_reports_turns_without_moving() {
    let mut engine = engine_at(3, 3, 2, 2);
    let result = engine
        .execute("wait", params(json!({"turns": 3})))
        .unwrap();

    assert!(result.success());
    assert_eq!(result.state_delta().len(), 1);
    assert_eq!(result.state_delta()["turns_waited"], json!(3));
    assert_eq!(engine.world().agent_position, Position::new(2, 2));

    let result = engine.execute("wait", Params::new()).unwrap();
    assert_eq!(result.state_delta()["turns_waited"], json!(1));
}

#[test]
fn oversized_steps_clamp_to_the_edge() {
    let mut engine = engine_at(3, 1, 0, 0);
    let result = engine
        .execute("move", params(json!({"direction": "east", "steps": u64::MAX})))
        .unwrap();

    assert!(result.success());
    assert_eq!(result.state_delta()["agent_position"], json!([2, 0]));
    assert!(result.message().contains("boundary"));
    assert_eq!(engine.world().agent_position, Position::new(2, 0));
}

#[test]
fn oversized_turns_are_reported_as_given() {
    let mut engine = engine_at(2, 2, 0, 0);
    let result = engine
        .execute("wait", params(json!({"turns": u64::MAX})))
        .unwrap();

    assert!(result.success());
    assert_eq!(result.state_delta()["turns_waited"], json!(u64::MAX));
    assert_eq!(engine.world().agent_position, Position::new(0, 0));
}

#[test]
fn snapshot_serializes_the_world() {
    let mut engine = engine_at(2, 2, 0, 0);
    engine
        .execute("move", params(json!({"direction": "south"})))
        .unwrap();

    let world: WorldState = serde_json::from_value(engine.snapshot()).unwrap();
    assert_eq!(world, *engine.world());
    assert_eq!(world.agent_position, Position::new(0, 1));
}

#[test]
fn unknown_action_fails() {
    let mut engine = engine_at(3, 3, 1, 1);
    let result = engine.execute("teleport", Params::new()).unwrap();
    assert!(!result.success());
    assert!(result.message().contains("Unknown action"));

    // Even when the routine is reached directly.
    let result = engine.perform("teleport", &Params::new()).unwrap();
    assert!(result.message().contains("Unknown action"));
}

#[test]
fn corrupt_position_is_a_fault() {
    let mut world = WorldState::open(2, 2, Position::new(0, 0)).unwrap();
    world.agent_position = Position::new(5, 5);
    let mut engine = GridNavigationEngine::new(world);

    assert!(engine
        .execute("move", params(json!({"direction": "east"})))
        .is_err());
    assert!(engine.execute("pickup", Params::new()).is_err());
}
