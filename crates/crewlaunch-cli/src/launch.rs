//! Pieces shared by `serve` and `run`: crew selection, runner construction,
//! and report rendering.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use pulldown_cmark::{Event, Options, Parser, html};

use crewlaunch_core::adapter::{LogAdapter, UiSurface};
use crewlaunch_core::crew::{Crew, LaunchBrief, launch_crew, parse_crew_toml};
use crewlaunch_core::llm::OpenAiCompatClient;
use crewlaunch_core::runner::{CrewOutput, CrewRunner, RunError};
use crewlaunch_core::tools::{BUILTIN_TOOLS, ToolRegistry};

use crate::config::CrewlaunchConfig;

/// Where the crew definition comes from.
#[derive(Debug, Clone)]
pub enum CrewSource {
    /// The embedded product launch crew.
    Builtin,
    /// A user-supplied crew TOML, validated at load time.
    File { path: PathBuf, content: String },
}

impl CrewSource {
    /// Read and validate `path`, or use the built-in crew when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::Builtin);
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read crew file {}", path.display()))?;
        parse_crew_toml(&content, BUILTIN_TOOLS)
            .with_context(|| format!("invalid crew file {}", path.display()))?;
        Ok(Self::File {
            path: path.to_path_buf(),
            content,
        })
    }

    /// Resolve the crew for one product.
    pub fn crew_for(&self, brief: &LaunchBrief) -> Result<Crew> {
        match self {
            Self::Builtin => Ok(launch_crew(brief)),
            Self::File { path, content } => Crew::from_toml_str(content, brief, BUILTIN_TOOLS)
                .with_context(|| format!("invalid crew file {}", path.display())),
        }
    }
}

/// Build a runner against the configured provider with the built-in tools.
pub fn build_runner(config: &CrewlaunchConfig) -> Result<CrewRunner> {
    let client = OpenAiCompatClient::new(config.llm_config()?)
        .context("failed to create LLM client")?;
    tracing::debug!(model = %config.model, base_url = %config.base_url, "LLM client ready");
    Ok(CrewRunner::new(
        Arc::new(client),
        ToolRegistry::builtin(config.search.clone()),
    ))
}

/// A finished run, successful or not.
pub struct RunOutcome<S> {
    pub result: Result<CrewOutput, RunError>,
    /// Wall-clock seconds spent in kickoff.
    pub seconds: f64,
    pub surface: S,
}

/// Run `crew` with its trace streamed through a log adapter into `surface`.
pub async fn run_with_surface<S: UiSurface>(
    runner: &CrewRunner,
    crew: &Crew,
    surface: S,
) -> RunOutcome<S> {
    let mut adapter = LogAdapter::new(surface).with_roles(crew.roles());
    let start = Instant::now();
    let result = runner.kickoff(crew, &mut adapter).await;
    let seconds = start.elapsed().as_secs_f64();
    adapter.flush_pending();
    RunOutcome {
        result,
        seconds,
        surface: adapter.into_surface(),
    }
}

/// "Total elapsed time: 12.34 seconds".
pub fn elapsed_text(seconds: f64) -> String {
    format!("Total elapsed time: {seconds:.2} seconds")
}

/// Render report markdown to HTML. Raw HTML in the report is shown as text.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
