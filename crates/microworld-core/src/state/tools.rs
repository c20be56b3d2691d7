//! Tool definitions offered to an agent's reasoning process.

use anyhow::Result;
use async_trait::async_trait;
use microworld_actions::{ActionCatalog, ActionSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Name of the read-only tool that reports the live world snapshot.
pub const OBSERVE_TOOL: &str = "observe";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool input
    #[serde(default)]
    pub input_schema: Value,
    /// Whether the tool only reads state
    #[serde(default)]
    pub read_only: bool,
}

impl ToolDefinition {
    pub fn observe() -> Self {
        Self {
            name: OBSERVE_TOOL.to_string(),
            description: "Report the current grid, agent position and inventory".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
            read_only: true,
        }
    }

    pub fn from_schema(schema: &ActionSchema) -> Self {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &schema.parameters {
            let mut prop = json!({
                "type": param.param_type.name(),
                "description": param.description,
            });
            if let Some(default) = &param.default {
                prop["default"] = default.clone();
            }
            if let Some(min) = param.minimum {
                prop["minimum"] = json!(min);
            }
            properties.insert(param.name.clone(), prop);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        Self {
            name: schema.action_id.clone(),
            description: schema.description.clone(),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
            read_only: false,
        }
    }
}

/// Source of the tools an agent may call.
#[async_trait]
pub trait ToolStore: Send + Sync {
    async fn get_agent_tools(&self, agent_id: &str) -> Result<Vec<ToolDefinition>>;
}

/// Derives tools from an action catalog: `observe` plus one tool per action.
#[derive(Debug, Clone)]
pub struct CatalogToolStore {
    tools: Vec<ToolDefinition>,
    allow: std::collections::BTreeMap<String, Vec<String>>,
}

impl CatalogToolStore {
    pub fn new(catalog: &ActionCatalog, game_type: &str) -> Self {
        let mut tools = vec![ToolDefinition::observe()];
        if let Some(actions) = catalog.actions(game_type) {
            tools.extend(actions.iter().map(ToolDefinition::from_schema));
        }
        Self {
            tools,
            allow: Default::default(),
        }
    }

    /// Restrict an agent to the named tools.
    pub fn allow(mut self, agent_id: impl Into<String>, tools: Vec<String>) -> Self {
        self.allow.insert(agent_id.into(), tools);
        self
    }
}

#[async_trait]
impl ToolStore for CatalogToolStore {
    async fn get_agent_tools(&self, agent_id: &str) -> Result<Vec<ToolDefinition>> {
        let tools = match self.allow.get(agent_id) {
            Some(names) => self
                .tools
                .iter()
                .filter(|t| names.contains(&t.name))
                .cloned()
                .collect(),
            None => self.tools.clone(),
        };
        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_becomes_json_schema() {
        let schemas = microworld_grid::schemas();
        let tool = ToolDefinition::from_schema(&schemas[0]);

        assert_eq!(tool.name, "move");
        assert_eq!(tool.input_schema["required"], json!(["direction"]));
        assert_eq!(tool.input_schema["properties"]["steps"]["type"], "integer");
        assert_eq!(tool.input_schema["properties"]["steps"]["default"], 1);
        assert!(!tool.read_only);
    }

    #[tokio::test]
    async fn allow_list_filters_tools() {
        let mut catalog = ActionCatalog::new();
        for schema in microworld_grid::schemas() {
            catalog.register(microworld_grid::GAME_TYPE, schema).unwrap();
        }
        let store = CatalogToolStore::new(&catalog, microworld_grid::GAME_TYPE)
            .allow("scout", vec!["observe".into(), "move".into()]);

        let all = store.get_agent_tools("anyone").await.unwrap();
        assert_eq!(all.len(), 4);

        let scout = store.get_agent_tools("scout").await.unwrap();
        let names: Vec<_> = scout.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["observe", "move"]);
    }
}
