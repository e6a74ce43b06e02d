//! Crew TOML parser with validation.
//!
//! Parses a `crew.toml` string into a [`CrewToml`] and validates:
//! - At least one agent and one task are defined.
//! - Agent roles and task names are unique.
//! - Every task is assigned to a known agent.
//! - Every agent tool is a known tool name.
//! - `context` references point to tasks that run *earlier* in the sequence.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::toml_format::CrewToml;

/// Errors that can occur during crew parsing and validation.
#[derive(Debug, Error)]
pub enum CrewParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("crew must contain at least one agent")]
    NoAgents,

    #[error("crew must contain at least one task")]
    NoTasks,

    #[error("duplicate agent role: {0:?}")]
    DuplicateRole(String),

    #[error("duplicate task name: {0:?}")]
    DuplicateTaskName(String),

    #[error("task {task:?} is assigned to unknown agent {agent:?}")]
    UnknownAgent { task: String, agent: String },

    #[error("task {task:?} uses unknown context task {context:?}")]
    UnknownContext { task: String, context: String },

    #[error("task {task:?} uses context {context:?}, which does not run before it")]
    ContextNotEarlier { task: String, context: String },

    #[error("agent {agent:?} uses unknown tool {tool:?}")]
    UnknownTool { agent: String, tool: String },

    #[error("agent {0:?} has max_iter = 0")]
    ZeroMaxIter(String),
}

/// Parse and validate a `crew.toml` string.
///
/// `known_tools` lists the tool names agents may reference.
pub fn parse_crew_toml(content: &str, known_tools: &[&str]) -> Result<CrewToml, CrewParseError> {
    let crew: CrewToml = toml::from_str(content)?;
    validate(&crew, known_tools)?;
    Ok(crew)
}

/// Validate the parsed crew structure.
pub fn validate(crew: &CrewToml, known_tools: &[&str]) -> Result<(), CrewParseError> {
    if crew.agents.is_empty() {
        return Err(CrewParseError::NoAgents);
    }
    if crew.tasks.is_empty() {
        return Err(CrewParseError::NoTasks);
    }

    let mut roles = HashSet::new();
    for agent in &crew.agents {
        if !roles.insert(agent.role.as_str()) {
            return Err(CrewParseError::DuplicateRole(agent.role.clone()));
        }
        if agent.max_iter == 0 {
            return Err(CrewParseError::ZeroMaxIter(agent.role.clone()));
        }
        for tool in &agent.tools {
            if !known_tools.contains(&tool.as_str()) {
                return Err(CrewParseError::UnknownTool {
                    agent: agent.role.clone(),
                    tool: tool.clone(),
                });
            }
        }
    }

    // Position of each task in the sequence, for the "runs earlier" check.
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (idx, task) in crew.tasks.iter().enumerate() {
        if positions.insert(task.name.as_str(), idx).is_some() {
            return Err(CrewParseError::DuplicateTaskName(task.name.clone()));
        }
    }

    for (idx, task) in crew.tasks.iter().enumerate() {
        if !roles.contains(task.agent.as_str()) {
            return Err(CrewParseError::UnknownAgent {
                task: task.name.clone(),
                agent: task.agent.clone(),
            });
        }

        for ctx in &task.context {
            match positions.get(ctx.as_str()) {
                None => {
                    return Err(CrewParseError::UnknownContext {
                        task: task.name.clone(),
                        context: ctx.clone(),
                    });
                }
                Some(&pos) if pos >= idx => {
                    return Err(CrewParseError::ContextNotEarlier {
                        task: task.name.clone(),
                        context: ctx.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOOLS: &[&str] = &["search"];

    const HEADER: &str = r#"
[crew]
name = "Test"

[[agents]]
role = "Analyst"
goal = "Analyze"
backstory = "Knows markets"
tools = ["search"]

[[agents]]
role = "Writer"
goal = "Write"
backstory = "Writes well"
"#;

    fn with_tasks(tasks: &str) -> String {
        format!("{HEADER}{tasks}")
    }

    #[test]
    fn parse_valid_crew() {
        let toml_str = with_tasks(
            r#"
[[tasks]]
name = "a"
description = "Task A"
expected_output = "Out A"
agent = "Analyst"

[[tasks]]
name = "b"
description = "Task B"
expected_output = "Out B"
agent = "Writer"
context = ["a"]
"#,
        );
        let crew = parse_crew_toml(&toml_str, TOOLS).expect("should parse");
        assert_eq!(crew.tasks.len(), 2);
        assert_eq!(crew.tasks[1].context, vec!["a".to_string()]);
    }

    #[test]
    fn rejects_missing_tasks() {
        let err = parse_crew_toml(HEADER, TOOLS).unwrap_err();
        assert!(matches!(err, CrewParseError::NoTasks), "got: {err}");
    }

    #[test]
    fn rejects_missing_agents() {
        let toml_str = r#"
[crew]
name = "Empty"

[[tasks]]
name = "a"
description = "Task A"
expected_output = "Out"
agent = "Nobody"
"#;
        let err = parse_crew_toml(toml_str, TOOLS).unwrap_err();
        assert!(matches!(err, CrewParseError::NoAgents), "got: {err}");
    }

    #[test]
    fn rejects_duplicate_roles() {
        let toml_str = r#"
[crew]
name = "Dup"

[[agents]]
role = "Analyst"
goal = "g"
backstory = "b"

[[agents]]
role = "Analyst"
goal = "g"
backstory = "b"

[[tasks]]
name = "a"
description = "d"
expected_output = "o"
agent = "Analyst"
"#;
        let err = parse_crew_toml(toml_str, TOOLS).unwrap_err();
        assert!(
            matches!(err, CrewParseError::DuplicateRole(ref r) if r == "Analyst"),
            "got: {err}"
        );
    }

    #[test]
    fn rejects_duplicate_task_names() {
        let toml_str = with_tasks(
            r#"
[[tasks]]
name = "a"
description = "d"
expected_output = "o"
agent = "Analyst"

[[tasks]]
name = "a"
description = "d"
expected_output = "o"
agent = "Writer"
"#,
        );
        let err = parse_crew_toml(&toml_str, TOOLS).unwrap_err();
        assert!(
            matches!(err, CrewParseError::DuplicateTaskName(ref n) if n == "a"),
            "got: {err}"
        );
    }

    #[test]
    fn rejects_unknown_agent() {
        let toml_str = with_tasks(
            r#"
[[tasks]]
name = "a"
description = "d"
expected_output = "o"
agent = "Chef"
"#,
        );
        let err = parse_crew_toml(&toml_str, TOOLS).unwrap_err();
        assert!(
            matches!(err, CrewParseError::UnknownAgent { ref agent, .. } if agent == "Chef"),
            "got: {err}"
        );
    }

    #[test]
    fn rejects_unknown_context() {
        let toml_str = with_tasks(
            r#"
[[tasks]]
name = "a"
description = "d"
expected_output = "o"
agent = "Analyst"
context = ["ghost"]
"#,
        );
        let err = parse_crew_toml(&toml_str, TOOLS).unwrap_err();
        assert!(
            matches!(err, CrewParseError::UnknownContext { ref context, .. } if context == "ghost"),
            "got: {err}"
        );
    }

    #[test]
    fn rejects_forward_context() {
        let toml_str = with_tasks(
            r#"
[[tasks]]
name = "a"
description = "d"
expected_output = "o"
agent = "Analyst"
context = ["b"]

[[tasks]]
name = "b"
description = "d"
expected_output = "o"
agent = "Writer"
"#,
        );
        let err = parse_crew_toml(&toml_str, TOOLS).unwrap_err();
        assert!(
            matches!(err, CrewParseError::ContextNotEarlier { ref task, ref context } if task == "a" && context == "b"),
            "got: {err}"
        );
    }

    #[test]
    fn rejects_self_context() {
        let toml_str = with_tasks(
            r#"
[[tasks]]
name = "a"
description = "d"
expected_output = "o"
agent = "Analyst"
context = ["a"]
"#,
        );
        let err = parse_crew_toml(&toml_str, TOOLS).unwrap_err();
        assert!(matches!(err, CrewParseError::ContextNotEarlier { .. }), "got: {err}");
    }

    #[test]
    fn rejects_unknown_tool() {
        let err = parse_crew_toml(
            &with_tasks(
                r#"
[[tasks]]
name = "a"
description = "d"
expected_output = "o"
agent = "Analyst"
"#,
            ),
            &[],
        )
        .unwrap_err();
        assert!(
            matches!(err, CrewParseError::UnknownTool { ref tool, .. } if tool == "search"),
            "got: {err}"
        );
    }

    #[test]
    fn rejects_zero_max_iter() {
        let toml_str = r#"
[crew]
name = "Zero"

[[agents]]
role = "Analyst"
goal = "g"
backstory = "b"
max_iter = 0

[[tasks]]
name = "a"
description = "d"
expected_output = "o"
agent = "Analyst"
"#;
        let err = parse_crew_toml(toml_str, TOOLS).unwrap_err();
        assert!(matches!(err, CrewParseError::ZeroMaxIter(_)), "got: {err}");
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = parse_crew_toml("this is not [valid toml", TOOLS).unwrap_err();
        assert!(matches!(err, CrewParseError::TomlError(_)), "got: {err}");
    }
}
