//! End-to-end tests for the sequential crew runner.

use std::sync::Arc;

use crewlaunch_core::crew::{Crew, LaunchBrief, launch_crew};
use crewlaunch_core::llm::Role;
use crewlaunch_core::runner::{
    CONTEXT_SEPARATOR, CrewRunner, FORCE_FINAL_ANSWER, RunError, STOP_SEQUENCE,
};
use crewlaunch_core::tools::{BUILTIN_TOOLS, ToolRegistry};
use crewlaunch_test_utils::{FailingLlm, FailingTool, ScriptedLlm, StaticTool};

// ===========================================================================
// Helpers
// ===========================================================================

fn brief() -> LaunchBrief {
    LaunchBrief::with_month("SolarKettle", "Jan 2025")
}

fn runner(llm: Arc<ScriptedLlm>, tools: ToolRegistry) -> CrewRunner {
    CrewRunner::new(llm, tools)
}

const SINGLE_TASK_CREW: &str = r#"
[crew]
name = "solo"

[[agents]]
role = "Researcher"
goal = "Research {product_name}"
backstory = "Curious."
tools = ["search"]
max_iter = 2

[[tasks]]
name = "research"
description = "Research {product_name}."
expected_output = "Notes."
agent = "Researcher"
"#;

fn solo_crew() -> Crew {
    Crew::from_toml_str(SINGLE_TASK_CREW, &brief(), BUILTIN_TOOLS)
        .expect("valid crew")
}

// ===========================================================================
// Launch crew
// ===========================================================================

#[tokio::test]
async fn solar_kettle_passes_context_in_declared_order() {
    let llm = Arc::new(ScriptedLlm::new([
        "Thought: I now know the final answer\nFinal Answer: M1",
        "Thought: I now know the final answer\nFinal Answer: T1",
        "Thought: I now know the final answer\nFinal Answer: B1",
    ]));
    let crew = launch_crew(&brief());
    let mut trace = String::new();

    let output = runner(llm.clone(), ToolRegistry::new())
        .kickoff(&crew, &mut trace)
        .await
        .expect("run succeeds");

    let requests = llm.requests();
    assert_eq!(requests.len(), 3);

    // Task 1: no context.
    let first = llm.last_message(0);
    assert!(!first.contains("This is the context you're working with"));
    assert!(first.contains("SolarKettle"));

    // Task 2: task 1's output.
    let second = llm.last_message(1);
    assert!(second.contains("This is the context you're working with:\nM1"));

    // Task 3: technology first, then market.
    let third = llm.last_message(2);
    assert!(third.contains(&format!(
        "This is the context you're working with:\nT1{CONTEXT_SEPARATOR}M1"
    )));

    assert_eq!(output.final_output, "B1");
    let names: Vec<&str> = output.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["market", "technology", "business"]);
    assert_eq!(output.tasks[1].agent, "Technology Expert");
}

#[tokio::test]
async fn every_request_carries_stop_sequence_and_roles() {
    let llm = Arc::new(ScriptedLlm::new([
        "Final Answer: a",
        "Final Answer: b",
        "Final Answer: c",
    ]));
    let crew = launch_crew(&brief());

    runner(llm.clone(), ToolRegistry::new())
        .kickoff(&crew, &mut String::new())
        .await
        .expect("run succeeds");

    for request in llm.requests() {
        assert_eq!(request.stop, vec![STOP_SEQUENCE.to_string()]);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].role, Role::User);
    }
    assert!(llm.requests()[0].messages[0].content.starts_with("You are Market Research Analyst."));
}

#[tokio::test]
async fn trace_has_verbose_shape() {
    let llm = Arc::new(ScriptedLlm::new([
        "Final Answer: M1",
        "Final Answer: T1",
        "Final Answer: B1",
    ]));
    let crew = launch_crew(&brief());
    let mut trace = String::new();

    runner(llm, ToolRegistry::new())
        .kickoff(&crew, &mut trace)
        .await
        .expect("run succeeds");

    assert!(trace.contains(" [DEBUG]: == Working Agent: Market Research Analyst\n"));
    assert!(trace.contains(" [INFO]: == Starting Task: "));
    assert_eq!(trace.matches("> Entering new agent-execution chain...").count(), 3);
    assert_eq!(trace.matches("> Finished chain.").count(), 3);
    assert!(trace.contains(" [DEBUG]: == [Business Development Consultant] Task output: B1\n"));
}

// ===========================================================================
// Tools
// ===========================================================================

#[tokio::test]
async fn tool_observation_is_fed_back() {
    let llm = Arc::new(ScriptedLlm::new([
        "Thought: search first\nAction: search\nAction Input: solar kettle market",
        "Thought: I now know the final answer\nFinal Answer: Kettles sell.",
    ]));
    let tool = Arc::new(StaticTool::new("search", "1. Kettle boom"));
    let mut tools = ToolRegistry::new();
    tools.register_shared(tool.clone());
    let mut trace = String::new();

    let output = runner(llm.clone(), tools)
        .kickoff(&solo_crew(), &mut trace)
        .await
        .expect("run succeeds");

    assert_eq!(output.final_output, "Kettles sell.");
    assert_eq!(tool.inputs(), vec!["solar kettle market".to_string()]);
    assert_eq!(llm.last_message(1), "Observation: 1. Kettle boom");
    assert!(trace.contains("\nObservation: 1. Kettle boom\n"));
}

#[tokio::test]
async fn tool_failure_becomes_observation() {
    let llm = Arc::new(ScriptedLlm::new([
        "Action: search\nAction Input: kettles",
        "Final Answer: Best effort.",
    ]));
    let mut tools = ToolRegistry::new();
    tools.register(FailingTool::new("search", "connection refused"));

    let output = runner(llm.clone(), tools)
        .kickoff(&solo_crew(), &mut String::new())
        .await
        .expect("tool failure does not abort the run");

    assert_eq!(output.final_output, "Best effort.");
    assert_eq!(
        llm.last_message(1),
        "Observation: Error performing search: connection refused"
    );
}

#[tokio::test]
async fn unknown_tool_lists_available_tools() {
    let llm = Arc::new(ScriptedLlm::new([
        "Action: browse\nAction Input: x",
        "Final Answer: ok",
    ]));
    let mut tools = ToolRegistry::new();
    tools.register(StaticTool::new("search", "unused"));

    runner(llm.clone(), tools)
        .kickoff(&solo_crew(), &mut String::new())
        .await
        .expect("run succeeds");

    assert_eq!(
        llm.last_message(1),
        "Observation: Tool 'browse' does not exist. Available tools: search"
    );
}

#[tokio::test]
async fn max_iter_forces_final_answer() {
    // Solo crew allows two iterations.
    let llm = Arc::new(ScriptedLlm::new([
        "Action: search\nAction Input: one",
        "Action: search\nAction Input: two",
        "Thought: fine\nFinal Answer: Forced.",
    ]));
    let mut tools = ToolRegistry::new();
    tools.register(StaticTool::new("search", "result"));

    let output = runner(llm.clone(), tools)
        .kickoff(&solo_crew(), &mut String::new())
        .await
        .expect("run succeeds");

    assert_eq!(output.final_output, "Forced.");
    assert_eq!(llm.requests().len(), 3);
    assert_eq!(llm.last_message(2), FORCE_FINAL_ANSWER);
}

// ===========================================================================
// Memory
// ===========================================================================

#[tokio::test]
async fn memory_carries_outputs_outside_explicit_context() {
    let toml = r#"
[crew]
name = "memo"

[[agents]]
role = "Writer"
goal = "Write"
backstory = "Writes."
memory = true

[[agents]]
role = "Forgetful"
goal = "Write"
backstory = "Forgets."

[[tasks]]
name = "one"
description = "First."
expected_output = "Text."
agent = "Writer"

[[tasks]]
name = "two"
description = "Second."
expected_output = "Text."
agent = "Forgetful"

[[tasks]]
name = "three"
description = "Third."
expected_output = "Text."
agent = "Writer"
context = ["two"]
"#;
    let crew = Crew::from_toml_str(toml, &brief(), BUILTIN_TOOLS).expect("valid crew");
    let llm = Arc::new(ScriptedLlm::new([
        "Final Answer: alpha",
        "Final Answer: beta",
        "Final Answer: gamma",
    ]));

    runner(llm.clone(), ToolRegistry::new())
        .kickoff(&crew, &mut String::new())
        .await
        .expect("run succeeds");

    // Forgetful agent gets nothing from memory.
    assert!(!llm.last_message(1).contains("Useful context from memory"));

    let third = llm.last_message(2);
    assert!(third.contains("This is the context you're working with:\nbeta"));
    assert!(third.contains("# Useful context from memory:\n- [Writer] alpha"));
    assert!(!third.contains("- [Forgetful] beta"));
}

// ===========================================================================
// Failures
// ===========================================================================

#[tokio::test]
async fn llm_failure_aborts_run() {
    let crew = launch_crew(&brief());
    let llm = Arc::new(FailingLlm::new("upstream down"));
    let mut trace = String::new();

    let err = CrewRunner::new(llm, ToolRegistry::new())
        .kickoff(&crew, &mut trace)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Llm(_)));
    assert!(err.to_string().contains("upstream down"));
    assert!(!trace.contains("Finished chain."));
}

#[tokio::test]
async fn script_exhaustion_surfaces_as_llm_error() {
    let llm = Arc::new(ScriptedLlm::new(["Final Answer: only one"]));
    let err = runner(llm, ToolRegistry::new())
        .kickoff(&launch_crew(&brief()), &mut String::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Llm(_)));
}

#[tokio::test]
async fn empty_crew_is_rejected() {
    let mut crew = solo_crew();
    crew.tasks.clear();
    let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()));

    let err = runner(llm.clone(), ToolRegistry::new())
        .kickoff(&crew, &mut String::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::EmptyCrew));
    assert!(llm.requests().is_empty());
}
