//! `crewlaunch crew show` and `crewlaunch crew validate`.

use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crewlaunch_core::crew::{Crew, LaunchBrief, parse_crew_toml};
use crewlaunch_core::tools::BUILTIN_TOOLS;

use crate::CrewCommands;
use crate::launch::CrewSource;

pub fn run_crew_command(command: CrewCommands, source: &CrewSource) -> Result<()> {
    match command {
        CrewCommands::Show { product } => {
            let brief = match product {
                Some(name) => LaunchBrief::new(name),
                None => LaunchBrief::placeholder(),
            };
            let crew = source.crew_for(&brief)?;
            print!("{}", format_crew(&crew));
        }
        CrewCommands::Validate { file } => {
            println!("{}", validate_file(&file)?);
        }
    }
    Ok(())
}

/// Parse and validate a crew file, returning a one-line summary.
pub fn validate_file(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read crew file {}", path.display()))?;
    let def = parse_crew_toml(&content, BUILTIN_TOOLS)
        .with_context(|| format!("invalid crew file {}", path.display()))?;
    Ok(format!(
        "Crew \"{}\" is valid: {} agent(s), {} task(s).",
        def.crew.name,
        def.agents.len(),
        def.tasks.len()
    ))
}

/// Human-readable crew listing.
pub fn format_crew(crew: &Crew) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Crew: {}", crew.name);
    let _ = writeln!(out);
    let _ = writeln!(out, "Agents:");
    for (i, agent) in crew.agents.iter().enumerate() {
        let mut flags = Vec::new();
        if !agent.tools.is_empty() {
            flags.push(format!("tools: {}", agent.tools.join(", ")));
        }
        if agent.memory {
            flags.push("memory".to_string());
        }
        if agent.allow_delegation {
            flags.push("delegation".to_string());
        }
        flags.push(format!("max_iter: {}", agent.max_iter));
        let _ = writeln!(out, "  {}. {} [{}]", i + 1, agent.role, flags.join("; "));
        let _ = writeln!(out, "     Goal: {}", agent.goal);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Tasks:");
    for (i, task) in crew.tasks.iter().enumerate() {
        let context: Vec<&str> = task
            .context
            .iter()
            .filter_map(|&c| crew.tasks.get(c))
            .map(|t| t.name.as_str())
            .collect();
        let _ = writeln!(
            out,
            "  {}. {} ({})",
            i + 1,
            task.name,
            crew.agent_for(task).role
        );
        let _ = writeln!(
            out,
            "     Context: {}",
            if context.is_empty() {
                "-".to_string()
            } else {
                context.join(", ")
            }
        );
        let _ = writeln!(out, "     Expected: {}", task.expected_output);
    }
    out
}
