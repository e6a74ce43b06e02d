//! Log adapter behaviour, alone and wired to a real crew run.

use std::sync::Arc;

use crewlaunch_core::adapter::markup::to_html;
use crewlaunch_core::adapter::{LogAdapter, ROBOT_GLYPH, strip_ansi};
use crewlaunch_core::crew::{LaunchBrief, launch_crew};
use crewlaunch_core::runner::CrewRunner;
use crewlaunch_core::tools::ToolRegistry;
use crewlaunch_test_utils::{RecordingSurface, ScriptedLlm};

fn adapter() -> LogAdapter<RecordingSurface> {
    LogAdapter::new(RecordingSurface::new())
}

// ===========================================================================
// Chunk handling
// ===========================================================================

#[test]
fn strip_is_idempotent() {
    let raw = "\x1b[1m\x1b[95m [DEBUG]: == Working Agent\x1b[0m\x1b[K";
    let once = strip_ansi(raw);
    assert_eq!(once, " [DEBUG]: == Working Agent");
    assert_eq!(strip_ansi(&once), once);
}

#[test]
fn partial_chunks_wait_for_newline() {
    let mut adapter = adapter();
    adapter.ingest("Thought: I should");
    assert_eq!(adapter.pending_len(), 1);
    adapter.ingest(" look this up");
    assert_eq!(adapter.pending_len(), 2);
    assert!(adapter.surface().blocks.is_empty());

    adapter.ingest(" now\n");
    assert_eq!(adapter.pending_len(), 0);
    assert_eq!(
        adapter.surface().blocks,
        vec!["Thought: I should look this up now\n".to_string()]
    );
}

#[test]
fn quoted_task_wins_and_toasts_once() {
    let mut adapter = adapter();
    adapter.ingest("Task: Beta {\"task\": \"Alpha\"}\n");
    assert_eq!(adapter.surface().toasts, vec![format!("{ROBOT_GLYPH} Alpha")]);
}

#[test]
fn task_object_toast() {
    let mut adapter = adapter();
    adapter.ingest("\"task\": \"Write market report\"\n");
    assert_eq!(
        adapter.surface().toasts,
        vec!["🤖 Write market report".to_string()]
    );
    assert_eq!(adapter.surface().blocks.len(), 1);
}

#[test]
fn entering_split_over_two_chunks() {
    let mut adapter = adapter();
    adapter.ingest("\n\n> Entering new agent-execution chain...");
    assert_eq!(adapter.color_index(), 1);
    // The leading newline already flushed the chunk.
    assert_eq!(adapter.pending_len(), 0);
    assert_eq!(
        adapter.surface().blocks[0],
        "\n\n> :green[Entering new agent-execution chain]..."
    );

    adapter.ingest("Market Research Analyst thinking\n");
    assert_eq!(adapter.color_index(), 1);
    assert_eq!(
        adapter.surface().blocks[1],
        ":green[Market Research Analyst] thinking\n"
    );
}

#[test]
fn cursor_wraps_after_four_chains() {
    let mut adapter = adapter();
    for expected in [1, 2, 3, 0, 1] {
        adapter.ingest("> Entering new agent-execution chain...\n");
        assert_eq!(adapter.color_index(), expected);
    }
}

#[test]
fn html_rendering_escapes_trace_text() {
    let mut adapter = adapter();
    adapter.ingest("<b>Technology Expert</b> & co\n");
    let html = to_html(&adapter.surface().rendered());
    assert_eq!(
        html,
        "&lt;b&gt;<span class=\"hl hl-red\">Technology Expert</span>&lt;/b&gt; &amp; co\n"
    );
}

// ===========================================================================
// Wired to the runner
// ===========================================================================

#[tokio::test]
async fn crew_run_drives_surface() {
    let llm = Arc::new(ScriptedLlm::new([
        "Thought: I now know the final answer\nFinal Answer: M1",
        "Thought: I now know the final answer\nFinal Answer: T1",
        "Thought: I now know the final answer\nFinal Answer: B1",
    ]));
    let crew = launch_crew(&LaunchBrief::with_month("SolarKettle", "Jan 2025"));
    let mut adapter = LogAdapter::new(RecordingSurface::new()).with_roles(crew.roles());

    let output = CrewRunner::new(llm, ToolRegistry::new())
        .kickoff(&crew, &mut adapter)
        .await
        .expect("run succeeds");
    adapter.flush_pending();

    assert_eq!(output.final_output, "B1");
    // One chain per task: red -> green -> blue -> orange.
    assert_eq!(adapter.color_index(), 3);
    assert_eq!(adapter.pending_len(), 0);

    let surface = adapter.into_surface();
    let log = surface.rendered();
    assert!(log.contains(":green[Entering new agent-execution chain]"));
    assert!(log.contains(":green[Market Research Analyst]"));
    assert!(log.contains(":blue[Technology Expert]"));
    assert!(log.contains(":orange[Finished chain.]"));

    let starts: Vec<&String> = surface
        .toasts
        .iter()
        .filter(|t| t.starts_with("🤖 Analyze the market demand for SolarKettle"))
        .collect();
    assert_eq!(starts.len(), 1);
    assert!(surface.toasts.iter().all(|t| t.starts_with(ROBOT_GLYPH)));
}
