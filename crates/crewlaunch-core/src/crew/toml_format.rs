//! TOML format types for crew definition files.
//!
//! These types map directly to the `crew.toml` on-disk format and are
//! deserialized via `serde` + the `toml` crate. Text fields may contain the
//! `{product_name}` and `{current_month}` placeholders.

use serde::{Deserialize, Serialize};

/// Top-level structure of a `crew.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewToml {
    /// Crew metadata.
    pub crew: CrewMeta,
    /// Agents available to the crew.
    #[serde(default)]
    pub agents: Vec<AgentToml>,
    /// Tasks, in execution order.
    #[serde(default)]
    pub tasks: Vec<TaskToml>,
}

/// Crew-level metadata in `[crew]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewMeta {
    /// Human-readable crew name.
    pub name: String,
}

/// A single `[[agents]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentToml {
    /// Unique role name; tasks refer to agents by role.
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Whether the agent sees earlier task outputs as short-term memory.
    #[serde(default)]
    pub memory: bool,
    /// Carried for display; delegation is not performed.
    #[serde(default)]
    pub allow_delegation: bool,
    /// Names of tools the agent may call.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Maximum reasoning iterations before a final answer is forced.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
}

/// A single `[[tasks]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskToml {
    /// Unique task name within the crew (used as an identifier in `context`).
    pub name: String,
    pub description: String,
    pub expected_output: String,
    /// Role of the agent that performs this task.
    pub agent: String,
    /// Names of earlier tasks whose outputs are handed over as context.
    #[serde(default)]
    pub context: Vec<String>,
}

fn default_max_iter() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal_crew() {
        let toml_str = r#"
[crew]
name = "Tiny"

[[agents]]
role = "Writer"
goal = "Write"
backstory = "Writes things"

[[tasks]]
name = "draft"
description = "Draft a note"
expected_output = "A note"
agent = "Writer"
"#;
        let crew: CrewToml = toml::from_str(toml_str).expect("should parse");
        assert_eq!(crew.crew.name, "Tiny");
        assert_eq!(crew.agents.len(), 1);
        assert!(!crew.agents[0].memory);
        assert!(!crew.agents[0].allow_delegation);
        assert!(crew.agents[0].tools.is_empty());
        assert_eq!(crew.agents[0].max_iter, 20); // default
        assert!(crew.tasks[0].context.is_empty());
    }

    #[test]
    fn serialize_round_trips_through_toml() {
        let crew = CrewToml {
            crew: CrewMeta {
                name: "Pair".to_string(),
            },
            agents: vec![AgentToml {
                role: "Analyst".to_string(),
                goal: "Analyze {product_name}".to_string(),
                backstory: "Seasoned".to_string(),
                memory: true,
                allow_delegation: false,
                tools: vec!["search".to_string()],
                max_iter: 5,
            }],
            tasks: vec![TaskToml {
                name: "analyze".to_string(),
                description: "Analyze".to_string(),
                expected_output: "Report".to_string(),
                agent: "Analyst".to_string(),
                context: vec![],
            }],
        };
        let text = toml::to_string_pretty(&crew).expect("serialize");
        let back: CrewToml = toml::from_str(&text).expect("deserialize");
        assert_eq!(back, crew);
    }
}
