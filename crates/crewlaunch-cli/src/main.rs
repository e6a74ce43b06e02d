mod config;
mod crew_cmds;
mod diagram;
mod launch;
mod run_cmd;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crewlaunch_core::llm::openai::mask_api_key;

use config::{CliOverrides, ConfigFile, CrewlaunchConfig};
use launch::CrewSource;

#[derive(Parser)]
#[command(
    name = "crewlaunch",
    version,
    about = "Three-agent LLM crew that drafts a product launch report"
)]
struct Cli {
    /// Model name (overrides CREWLAUNCH_MODEL and the config file)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Crew definition TOML to use instead of the built-in launch crew
    #[arg(long, global = true)]
    crew_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a crewlaunch config file
    Init {
        /// API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Serve the web UI
    Serve {
        /// Address to bind (overrides CREWLAUNCH_BIND)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides CREWLAUNCH_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate a launch report in the terminal
    Run {
        /// Product to analyze
        product_name: String,
        /// Also write the report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Crew inspection
    Crew {
        #[command(subcommand)]
        command: CrewCommands,
    },
}

#[derive(Subcommand)]
pub enum CrewCommands {
    /// Show agents, tasks, and context hand-offs
    Show {
        /// Fill placeholders with this product name
        #[arg(long)]
        product: Option<String>,
    },
    /// Parse and validate a crew TOML file
    Validate {
        /// Path to the crew TOML file
        file: PathBuf,
    },
}

/// Execute the `crewlaunch init` command: write config file.
fn cmd_init(api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = ConfigFile::with_defaults(api_key);
    config::save_config_to(&cfg, &path)?;

    println!("Config written to {}", path.display());
    if let Some(model) = &cfg.llm.model {
        println!("  llm.model = {model}");
    }
    if let Some(base_url) = &cfg.llm.base_url {
        println!("  llm.base_url = {base_url}");
    }
    match cfg.llm.api_key.as_deref() {
        Some(key) => println!("  llm.api_key = {}", mask_api_key(key)),
        None => {
            println!();
            println!(
                "No API key stored. Set {} or re-run with --api-key before `crewlaunch serve`.",
                config::ENV_API_KEY
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { api_key, force } => {
            cmd_init(api_key, force)?;
        }
        Commands::Serve { bind, port } => {
            let resolved = CrewlaunchConfig::resolve(&CliOverrides {
                model: cli.model,
                bind,
                port,
            })?;
            let source = CrewSource::load(cli.crew_file.as_deref())?;
            let runner = launch::build_runner(&resolved)?;
            let state = serve_cmd::AppState::new(runner, source);
            serve_cmd::run_serve(state, &resolved.bind, resolved.port).await?;
        }
        Commands::Run {
            product_name,
            output,
        } => {
            let resolved = CrewlaunchConfig::resolve(&CliOverrides {
                model: cli.model,
                ..CliOverrides::default()
            })?;
            let source = CrewSource::load(cli.crew_file.as_deref())?;
            let runner = launch::build_runner(&resolved)?;
            run_cmd::run_launch(&runner, &source, &product_name, output.as_deref()).await?;
        }
        Commands::Crew { command } => {
            let source = CrewSource::load(cli.crew_file.as_deref())?;
            crew_cmds::run_crew_command(command, &source)?;
        }
    }

    Ok(())
}
