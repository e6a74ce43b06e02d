//! Configuration file management for crewlaunch.
//!
//! Provides a TOML-based config file at `~/.config/crewlaunch/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crewlaunch_core::llm::LlmConfig;
use crewlaunch_core::llm::openai::mask_api_key;
use crewlaunch_core::tools::SearchConfig;

pub const ENV_MODEL: &str = "CREWLAUNCH_MODEL";
pub const ENV_BASE_URL: &str = "CREWLAUNCH_BASE_URL";
pub const ENV_API_KEY: &str = "CREWLAUNCH_API_KEY";
/// Provider-specific fallback for the API key.
pub const ENV_CEREBRAS_API_KEY: &str = "CEREBRAS_API_KEY";
pub const ENV_BIND: &str = "CREWLAUNCH_BIND";
pub const ENV_PORT: &str = "CREWLAUNCH_PORT";

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8501;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchSection {
    /// DuckDuckGo region code, e.g. `us-en`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ConfigFile {
    /// The file `crewlaunch init` writes: every default spelled out.
    pub fn with_defaults(api_key: Option<String>) -> Self {
        Self {
            llm: LlmSection {
                model: Some(LlmConfig::DEFAULT_MODEL.to_string()),
                base_url: Some(LlmConfig::DEFAULT_BASE_URL.to_string()),
                temperature: Some(LlmConfig::DEFAULT_TEMPERATURE),
                api_key,
            },
            search: SearchSection {
                region: Some(SearchConfig::DEFAULT_REGION.to_string()),
                max_results: Some(SearchConfig::DEFAULT_MAX_RESULTS),
            },
            server: ServerSection {
                bind: Some(DEFAULT_BIND.to_string()),
                port: Some(DEFAULT_PORT),
            },
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the crewlaunch config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/crewlaunch` or
/// `~/.config/crewlaunch`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("crewlaunch");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("crewlaunch")
}

/// Return the path to the crewlaunch config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`. Returns `Ok(None)` if it does
/// not exist.
pub fn load_config_from(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file to `path`, creating parent dirs as
/// needed. Sets file permissions to 0600 on Unix.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The file may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved configuration, ready for use.
#[derive(Clone)]
pub struct CrewlaunchConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    pub search: SearchConfig,
    pub bind: String,
    pub port: u16,
}

impl CrewlaunchConfig {
    /// Resolve configuration from the CLI, the environment, and the default
    /// config file.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = load_config_from(&config_path())?;
        Self::resolve_with(cli, file.as_ref())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - Model: `--model` > `CREWLAUNCH_MODEL` > `llm.model` > `LlmConfig::DEFAULT_MODEL`
    /// - Base URL: `CREWLAUNCH_BASE_URL` > `llm.base_url` > `LlmConfig::DEFAULT_BASE_URL`
    /// - API key: `CREWLAUNCH_API_KEY` > `CEREBRAS_API_KEY` > `llm.api_key` > none
    /// - Bind/port: `--bind`/`--port` > `CREWLAUNCH_BIND`/`CREWLAUNCH_PORT` > `[server]` > default
    pub fn resolve_with(cli: &CliOverrides, file: Option<&ConfigFile>) -> Result<Self> {
        let llm = file.map(|f| &f.llm);
        let search = file.map(|f| &f.search);
        let server = file.map(|f| &f.server);

        let model = pick(
            cli.model.clone(),
            ENV_MODEL,
            llm.and_then(|l| l.model.clone()),
        )
        .unwrap_or_else(|| LlmConfig::DEFAULT_MODEL.to_string());

        let base_url = pick(None, ENV_BASE_URL, llm.and_then(|l| l.base_url.clone()))
            .unwrap_or_else(|| LlmConfig::DEFAULT_BASE_URL.to_string());

        let api_key = env_var(ENV_API_KEY)
            .or_else(|| env_var(ENV_CEREBRAS_API_KEY))
            .or_else(|| llm.and_then(|l| l.api_key.clone()))
            .filter(|k| !k.trim().is_empty());

        let temperature = llm
            .and_then(|l| l.temperature)
            .unwrap_or(LlmConfig::DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            bail!("llm.temperature must be between 0.0 and 2.0, got {temperature}");
        }

        let bind = pick(cli.bind.clone(), ENV_BIND, server.and_then(|s| s.bind.clone()))
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let port = match (cli.port, env_var(ENV_PORT)) {
            (Some(port), _) => port,
            (None, Some(raw)) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid {ENV_PORT} value: {raw:?}"))?,
            (None, None) => server.and_then(|s| s.port).unwrap_or(DEFAULT_PORT),
        };

        let mut search_config = SearchConfig::default();
        if let Some(region) = search.and_then(|s| s.region.clone()) {
            search_config.region = region;
        }
        if let Some(max) = search.and_then(|s| s.max_results) {
            search_config.max_results = max;
        }

        Ok(Self {
            model,
            base_url,
            temperature,
            api_key,
            search: search_config,
            bind,
            port,
        })
    }

    /// LLM client settings. Errors when no API key was found anywhere.
    pub fn llm_config(&self) -> Result<LlmConfig> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!(
                "API key not found: set {ENV_API_KEY} (or {ENV_CEREBRAS_API_KEY}), \
                 or add api_key to the [llm] section of {}",
                config_path().display()
            );
        };
        Ok(LlmConfig::new(api_key)
            .with_model(&self.model)
            .with_base_url(&self.base_url)
            .with_temperature(self.temperature))
    }
}

impl std::fmt::Debug for CrewlaunchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrewlaunchConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_deref().map(mask_api_key))
            .field("search", &self.search)
            .field("bind", &self.bind)
            .field("port", &self.port)
            .finish()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn pick(cli: Option<String>, env: &str, file: Option<String>) -> Option<String> {
    cli.or_else(|| env_var(env)).or(file)
}
