//! Crew definitions: agents, tasks, and the built-in product launch crew.
//!
//! A crew is authored as TOML (see [`toml_format`]), validated by
//! [`parser`], and resolved against a [`LaunchBrief`] into a [`Crew`] whose
//! tasks reference agents and context tasks by index.

pub mod parser;
pub mod toml_format;

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;

pub use parser::{CrewParseError, parse_crew_toml};
pub use toml_format::{AgentToml, CrewMeta, CrewToml, TaskToml};

use crate::tools::BUILTIN_TOOLS;

/// The embedded launch crew definition.
static LAUNCH_CREW_TOML: &str = include_str!("launch_crew.toml");

/// Values substituted into crew text placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchBrief {
    /// Fills `{product_name}`.
    pub product_name: String,
    /// Fills `{current_month}`, e.g. "Jan 2025".
    pub current_month: String,
}

impl LaunchBrief {
    /// Brief for `product_name`, dated with the local current month.
    pub fn new(product_name: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            current_month: chrono::Local::now().format("%b %Y").to_string(),
        }
    }

    pub fn with_month(product_name: impl Into<String>, current_month: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            current_month: current_month.into(),
        }
    }

    /// A brief that leaves the placeholders visible, for describing the crew
    /// before a product is chosen.
    pub fn placeholder() -> Self {
        Self::with_month("{product_name}", "{current_month}")
    }

    /// Substitute this brief into a template string.
    ///
    /// Both placeholders are replaced in one pass, so substituted values are
    /// never scanned for placeholders again.
    pub fn fill(&self, template: &str) -> String {
        placeholder_re()
            .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
                "product_name" => self.product_name.clone(),
                _ => self.current_month.clone(),
            })
            .into_owned()
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{(product_name|current_month)\}").expect("valid placeholder regex")
    })
}

/// A configured reasoning role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agent {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub memory: bool,
    pub allow_delegation: bool,
    pub tools: Vec<String>,
    pub max_iter: usize,
}

/// One unit of work bound to one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    /// Index into [`Crew::agents`].
    pub agent: usize,
    /// Indices into [`Crew::tasks`] of earlier tasks, in declared order.
    pub context: Vec<usize>,
}

/// A validated crew, ready to run sequentially.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crew {
    pub name: String,
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
}

impl Crew {
    /// Validate `def` and resolve it against `brief`.
    pub fn from_toml(
        def: &CrewToml,
        brief: &LaunchBrief,
        known_tools: &[&str],
    ) -> Result<Self, CrewParseError> {
        parser::validate(def, known_tools)?;

        let agents: Vec<Agent> = def
            .agents
            .iter()
            .map(|a| Agent {
                role: a.role.clone(),
                goal: brief.fill(&a.goal),
                backstory: brief.fill(&a.backstory),
                memory: a.memory,
                allow_delegation: a.allow_delegation,
                tools: a.tools.clone(),
                max_iter: a.max_iter,
            })
            .collect();

        let mut tasks = Vec::with_capacity(def.tasks.len());
        for t in &def.tasks {
            let agent = def
                .agents
                .iter()
                .position(|a| a.role == t.agent)
                .ok_or_else(|| CrewParseError::UnknownAgent {
                    task: t.name.clone(),
                    agent: t.agent.clone(),
                })?;
            let context = t
                .context
                .iter()
                .map(|name| {
                    def.tasks
                        .iter()
                        .position(|other| &other.name == name)
                        .ok_or_else(|| CrewParseError::UnknownContext {
                            task: t.name.clone(),
                            context: name.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            tasks.push(Task {
                name: t.name.clone(),
                description: brief.fill(&t.description),
                expected_output: brief.fill(&t.expected_output),
                agent,
                context,
            });
        }

        Ok(Self {
            name: def.crew.name.clone(),
            agents,
            tasks,
        })
    }

    /// Parse, validate, and resolve a crew TOML document.
    pub fn from_toml_str(
        content: &str,
        brief: &LaunchBrief,
        known_tools: &[&str],
    ) -> Result<Self, CrewParseError> {
        let def = parse_crew_toml(content, known_tools)?;
        Self::from_toml(&def, brief, known_tools)
    }

    /// The agent assigned to `task`.
    pub fn agent_for(&self, task: &Task) -> &Agent {
        &self.agents[task.agent]
    }

    /// Role names of all agents, in roster order.
    pub fn roles(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.role.as_str()).collect()
    }
}

/// The embedded launch crew as authored.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed. The file is compiled into the
/// binary and covered by tests, so this cannot happen in a released build.
pub fn launch_crew_definition() -> CrewToml {
    parse_crew_toml(LAUNCH_CREW_TOML, BUILTIN_TOOLS).expect("embedded launch_crew.toml is invalid")
}

/// Raw text of the embedded launch crew definition.
pub fn launch_crew_source() -> &'static str {
    LAUNCH_CREW_TOML
}

/// The three-agent, three-task product launch crew for `brief`.
///
/// # Panics
///
/// See [`launch_crew_definition`].
pub fn launch_crew(brief: &LaunchBrief) -> Crew {
    Crew::from_toml(&launch_crew_definition(), brief, BUILTIN_TOOLS)
        .expect("embedded launch_crew.toml is invalid")
}
