//! Sequential crew runner.
//!
//! Tasks run strictly in order. Each task sees the outputs of its declared
//! context tasks, and agents with memory also see the remaining earlier
//! outputs. Progress is written as a verbose text trace into the caller's
//! [`TraceSink`].

pub mod executor;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::crew::{Crew, Task};
use crate::llm::{LlmClient, LlmError};
use crate::tools::{Tool, ToolRegistry};
use crate::trace::{CHAIN_ENTERED, CHAIN_FINISHED, TraceSink};

pub use executor::{AgentExecutor, FORCE_FINAL_ANSWER, STOP_SEQUENCE, Step, parse_step};

/// Separator between context task outputs.
pub const CONTEXT_SEPARATOR: &str = "\n\n----------\n\n";

/// Longest slice of an earlier output carried as memory.
pub const MEMORY_SNIPPET_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("crew has no tasks")]
    EmptyCrew,
}

/// Output of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutput {
    pub name: String,
    /// Role of the agent that produced it.
    pub agent: String,
    pub raw: String,
}

/// Output of a whole crew run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrewOutput {
    pub tasks: Vec<TaskOutput>,
    /// Raw output of the last task.
    pub final_output: String,
}

/// Runs crews against one LLM client and a set of tools.
pub struct CrewRunner {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
}

impl CrewRunner {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        Self { llm, tools }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run every task of `crew` in order and return all outputs.
    ///
    /// Trace chunks are written to `trace` as they are produced. The first
    /// LLM error aborts the run.
    #[instrument(skip_all, fields(crew = %crew.name, model = %self.llm.model()))]
    pub async fn kickoff(
        &self,
        crew: &Crew,
        trace: &mut dyn TraceSink,
    ) -> Result<CrewOutput, RunError> {
        if crew.tasks.is_empty() {
            return Err(RunError::EmptyCrew);
        }

        tracing::info!(tasks = crew.tasks.len(), "crew kickoff");

        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(crew.tasks.len());

        for task in &crew.tasks {
            let agent = crew.agent_for(task);
            let tools = self.tools_for(&agent.tools, &agent.role);

            tracing::info!(task = %task.name, agent = %agent.role, "starting task");
            trace.write_chunk(&format!(" [DEBUG]: == Working Agent: {}\n", agent.role));
            trace.write_chunk(&format!(
                " [INFO]: == Starting Task: {}\n",
                one_line(&task.description)
            ));

            let context = context_for(task, &outputs);
            let memory = if agent.memory {
                memory_for(task, &outputs)
            } else {
                String::new()
            };
            let prompt = executor::task_prompt(
                &task.description,
                &task.expected_output,
                Some(&context),
                Some(&memory),
            );

            trace.write_chunk(&format!("\n\n> {CHAIN_ENTERED}...\n"));
            let raw = AgentExecutor::new(self.llm.as_ref(), agent, tools)
                .execute(prompt, trace)
                .await
                .inspect_err(|e| {
                    tracing::error!(task = %task.name, agent = %agent.role, error = %e, "task failed");
                })?;
            trace.write_chunk(&format!("\n> {CHAIN_FINISHED}\n"));
            trace.write_chunk(&format!(
                " [DEBUG]: == [{}] Task output: {}\n\n",
                agent.role, raw
            ));

            tracing::info!(task = %task.name, agent = %agent.role, chars = raw.len(), "task finished");
            outputs.push(TaskOutput {
                name: task.name.clone(),
                agent: agent.role.clone(),
                raw,
            });
        }

        let final_output = outputs.last().map(|o| o.raw.clone()).unwrap_or_default();
        tracing::info!("crew finished");
        Ok(CrewOutput {
            tasks: outputs,
            final_output,
        })
    }

    fn tools_for(&self, names: &[String], role: &str) -> Vec<&dyn Tool> {
        names
            .iter()
            .filter_map(|name| {
                let tool = self.tools.get(name);
                if tool.is_none() {
                    tracing::warn!(agent = %role, tool = %name, "tool not registered, skipping");
                }
                tool
            })
            .collect()
    }
}

/// Outputs of the task's declared context, in declared order.
fn context_for(task: &Task, outputs: &[TaskOutput]) -> String {
    task.context
        .iter()
        .filter_map(|&i| outputs.get(i))
        .map(|o| o.raw.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Earlier outputs not already passed as explicit context.
fn memory_for(task: &Task, outputs: &[TaskOutput]) -> String {
    outputs
        .iter()
        .enumerate()
        .filter(|(i, _)| !task.context.contains(i))
        .map(|(_, o)| format!("- [{}] {}", o.agent, truncate_chars(&o.raw, MEMORY_SNIPPET_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Collapse whitespace runs, newlines included, into single spaces.
fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(context: Vec<usize>) -> Task {
        Task {
            name: "t".to_string(),
            description: "d".to_string(),
            expected_output: "e".to_string(),
            agent: 0,
            context,
        }
    }

    fn output(name: &str, raw: &str) -> TaskOutput {
        TaskOutput {
            name: name.to_string(),
            agent: "Analyst".to_string(),
            raw: raw.to_string(),
        }
    }

    #[test]
    fn context_follows_declared_order() {
        let outputs = vec![output("a", "first"), output("b", "second")];
        let ctx = context_for(&task(vec![1, 0]), &outputs);
        assert_eq!(ctx, format!("second{CONTEXT_SEPARATOR}first"));
    }

    #[test]
    fn context_ignores_out_of_range_indices() {
        let outputs = vec![output("a", "first")];
        assert_eq!(context_for(&task(vec![0, 5]), &outputs), "first");
    }

    #[test]
    fn memory_skips_explicit_context() {
        let outputs = vec![output("a", "first"), output("b", "second")];
        let mem = memory_for(&task(vec![1]), &outputs);
        assert_eq!(mem, "- [Analyst] first");
    }

    #[test]
    fn memory_truncates_long_outputs() {
        let long = "x".repeat(MEMORY_SNIPPET_CHARS + 50);
        let mem = memory_for(&task(vec![]), &[output("a", &long)]);
        assert!(mem.ends_with("..."));
        assert_eq!(mem.chars().filter(|c| *c == 'x').count(), MEMORY_SNIPPET_CHARS);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }

    #[test]
    fn one_line_collapses_whitespace() {
        assert_eq!(one_line("  Analyze\n  the market\tnow "), "Analyze the market now");
    }
}
