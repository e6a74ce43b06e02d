//! `crewlaunch run`: one launch report in the terminal.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crewlaunch_core::adapter::UiSurface;
use crewlaunch_core::adapter::markup::to_ansi;
use crewlaunch_core::crew::LaunchBrief;
use crewlaunch_core::runner::CrewRunner;

use crate::launch::{CrewSource, elapsed_text, run_with_surface};

/// Prints flushed blocks as ANSI-coloured text to `out` and toasts to `err`.
///
/// A terminal shows the cumulative log by appending, so each block is
/// written once.
pub struct TerminalSurface<O, E> {
    out: O,
    err: E,
}

impl TerminalSurface<std::io::Stdout, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O, E> TerminalSurface<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn into_parts(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write + Send, E: Write + Send> UiSurface for TerminalSurface<O, E> {
    fn render(&mut self, block: &str) {
        // A closed stdout must not abort the run.
        let _ = self.out.write_all(to_ansi(block).as_bytes());
        let _ = self.out.flush();
    }

    fn toast(&mut self, message: &str) {
        let _ = writeln!(self.err, "{message}");
    }
}

/// Run the crew for `product_name`, streaming the trace to the terminal.
pub async fn run_launch(
    runner: &CrewRunner,
    source: &CrewSource,
    product_name: &str,
    output: Option<&Path>,
) -> Result<()> {
    let crew = source.crew_for(&LaunchBrief::new(product_name))?;
    let outcome = run_with_surface(runner, &crew, TerminalSurface::stdio()).await;
    let report = outcome.result.context("crew run failed")?;

    println!();
    println!("{}", elapsed_text(outcome.seconds));
    println!();
    println!("{}", report.final_output);

    if let Some(path) = output {
        std::fs::write(path, &report.final_output)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        eprintln!("Report written to {}", path.display());
    }

    Ok(())
}
