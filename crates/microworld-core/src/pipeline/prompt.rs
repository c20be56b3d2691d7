//! Prompt construction for a deployment session.

use std::fmt::Write;

use microworld_grid::WorldState;

use crate::state::{ToolDefinition, OBSERVE_TOOL};

/// Build the prompt handed to the reasoning process.
pub fn build_prompt(goal: &str, world: &WorldState, tools: &[ToolDefinition]) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "# Goal: {goal}\n");
    let _ = writeln!(
        prompt,
        "You control an agent (A) on a {}x{} grid. Coordinates are [x, y]; north decreases y.\n",
        world.width, world.height
    );
    let _ = writeln!(prompt, "## Grid\n\n```\n{}```\n", world.render());
    let _ = writeln!(
        prompt,
        "Current position: [{}, {}]",
        world.agent_position.x, world.agent_position.y
    );
    if !world.inventory.is_empty() {
        let _ = writeln!(prompt, "Inventory: {}", world.inventory.join(", "));
    }

    if !tools.is_empty() {
        let _ = writeln!(prompt, "\n## Tools\n");
        for tool in tools {
            let _ = writeln!(prompt, "- `{}`: {}", tool.name, tool.description);
        }
    }

    let _ = writeln!(
        prompt,
        "\n## Rules\n\nAfter every action, call `{OBSERVE_TOOL}` to confirm the new state \
         before deciding what to do next. Stop once the goal is achieved."
    );

    prompt
}
