use microworld_actions::{
    ActionCatalog, ActionEngine, ActionFault, ActionParameter, ActionResult, ActionSchema,
    CatalogError, ParamType, Params, StateDelta,
};
use serde_json::{json, Value};

/// Echoes validated parameters back as its delta.
struct EchoEngine {
    schemas: Vec<ActionSchema>,
    calls: Vec<String>,
}

impl EchoEngine {
    fn new() -> Self {
        let say = ActionSchema::new("say", "Say")
            .with_param(ActionParameter::required("text", ParamType::String))
            .with_param(ActionParameter::optional("loud", ParamType::Boolean, Some(json!(false))))
            .with_param(
                ActionParameter::optional("times", ParamType::Integer, Some(json!(1)))
                    .with_minimum(1),
            )
            .with_param(ActionParameter::optional("tag", ParamType::String, None));
        let explode = ActionSchema::new("explode", "Explode");
        Self {
            schemas: vec![say, explode],
            calls: Vec::new(),
        }
    }
}

impl ActionEngine for EchoEngine {
    fn game_type(&self) -> &str {
        "echo"
    }

    fn schemas(&self) -> &[ActionSchema] {
        &self.schemas
    }

    fn perform(&mut self, action_id: &str, params: &Params) -> Result<ActionResult, ActionFault> {
        self.calls.push(action_id.to_string());
        match action_id {
            "say" => Ok(ActionResult::ok(params.clone(), "said")),
            "explode" => Err(ActionFault::Internal("boom".into())),
            other => Ok(ActionResult::unknown_action(other)),
        }
    }
}

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn unknown_action_is_a_failed_result() {
    let mut engine = EchoEngine::new();
    let result = engine.execute("dance", Params::new()).unwrap();

    assert!(!result.success());
    assert_eq!(result.message(), "Unknown action: dance");
    assert!(result.error().is_some());
    assert!(result.state_delta().is_empty());
    assert!(engine.calls.is_empty());
}

#[test]
fn missing_required_parameter_names_it() {
    let mut engine = EchoEngine::new();
    let result = engine.execute("say", params(json!({"loud": true}))).unwrap();

    assert!(!result.success());
    assert_eq!(result.message(), "Invalid parameters");
    assert!(result.error().unwrap().contains("text"));
    assert!(engine.calls.is_empty());
}

#[test]
fn wrong_type_names_expected_type() {
    let mut engine = EchoEngine::new();

    let result = engine.execute("say", params(json!({"text": 5}))).unwrap();
    assert!(!result.success());
    assert!(result.error().unwrap().contains("must be a string"));

    let result = engine
        .execute("say", params(json!({"text": "hi", "times": "two"})))
        .unwrap();
    assert!(result.error().unwrap().contains("must be an integer"));

    let result = engine
        .execute("say", params(json!({"text": "hi", "loud": "yes"})))
        .unwrap();
    assert!(result.error().unwrap().contains("must be a boolean"));
}

#[test]
fn minimum_is_enforced() {
    let mut engine = EchoEngine::new();
    let result = engine
        .execute("say", params(json!({"text": "hi", "times": 0})))
        .unwrap();

    assert!(!result.success());
    assert!(result.error().unwrap().contains("at least 1"));
}

#[test]
fn integers_beyond_i64_still_meet_the_minimum() {
    let mut engine = EchoEngine::new();
    let result = engine
        .execute("say", params(json!({"text": "hi", "times": u64::MAX})))
        .unwrap();

    assert!(result.success(), "{:?}", result.error());
    assert_eq!(result.state_delta()["times"], json!(u64::MAX));
    assert_eq!(engine.snapshot(), Value::Null);
}

#[test]
fn defaults_are_filled_before_perform() {
    let mut engine = EchoEngine::new();
    let result = engine.execute("say", params(json!({"text": "hi"}))).unwrap();

    assert!(result.success());
    assert!(result.error().is_none());
    let delta = result.state_delta();
    assert_eq!(delta.get("loud"), Some(&json!(false)));
    assert_eq!(delta.get("times"), Some(&json!(1)));
    assert!(!delta.contains_key("tag"));
}

#[test]
fn faults_from_perform_propagate() {
    let mut engine = EchoEngine::new();
    let err = engine.execute("explode", Params::new()).unwrap_err();
    assert_eq!(err, ActionFault::Internal("boom".into()));
}

#[test]
fn catalog_rejects_duplicates_and_late_registration() {
    let mut catalog = ActionCatalog::new();
    catalog
        .register("echo", ActionSchema::new("say", "Say"))
        .unwrap();

    let err = catalog
        .register("echo", ActionSchema::new("say", "Say again"))
        .unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateAction { .. }));

    // Same id under another game type is fine.
    catalog
        .register("other", ActionSchema::new("say", "Say"))
        .unwrap();

    catalog.seal();
    let err = catalog
        .register("echo", ActionSchema::new("shout", "Shout"))
        .unwrap_err();
    assert_eq!(err, CatalogError::Sealed);

    assert!(catalog.lookup("echo", "say").is_some());
    assert!(catalog.lookup("echo", "shout").is_none());
    assert!(catalog.lookup("missing", "say").is_none());
    assert_eq!(catalog.game_types().collect::<Vec<_>>(), vec!["echo", "other"]);
}

#[test]
fn failed_results_never_carry_a_delta() {
    let result = ActionResult::fail("nope", "because");
    assert!(result.state_delta().is_empty());

    let result = ActionResult::ok(StateDelta::new(), "fine");
    assert!(result.error().is_none());
}
