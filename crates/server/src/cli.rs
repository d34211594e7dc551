use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use codesys_core::config::BridgeConfig;
use codesys_core::error::CoreError;
use codesys_core::scripting::command::LaunchStrategy;

/// Drive CODESYS projects through its scripting engine.
///
/// Flags override the matching `CODESYS_*` environment variables.
#[derive(Debug, Default, Parser)]
#[command(name = "codesys-mcp", version, about)]
pub struct Cli {
    /// Full path to CODESYS.exe
    #[arg(short = 'e', long = "codesys-path")]
    pub codesys_path: Option<PathBuf>,

    /// CODESYS profile name, e.g. "CODESYS V3.5 SP21"
    #[arg(short = 'p', long = "codesys-profile")]
    pub codesys_profile: Option<String>,

    /// Base directory for relative project paths
    #[arg(short = 'w', long = "workspace")]
    pub workspace: Option<PathBuf>,

    /// Directory containing the .py script templates
    #[arg(long = "scripts-dir")]
    pub scripts_dir: Option<PathBuf>,

    /// Seconds before a CODESYS run is terminated
    #[arg(long = "timeout-secs", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// How the CODESYS command line is passed to the OS
    #[arg(long = "launch-strategy", value_enum)]
    pub launch_strategy: Option<StrategyArg>,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Argv,
    Shell,
}

impl From<StrategyArg> for LaunchStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Argv => LaunchStrategy::ArgumentVector,
            StrategyArg::Shell => LaunchStrategy::ShellString,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    /// Apply flag overrides on top of an environment-derived config.
    pub fn apply(&self, mut config: BridgeConfig) -> BridgeConfig {
        if let Some(path) = &self.codesys_path {
            config.codesys_path = path.clone();
        }
        if let Some(profile) = &self.codesys_profile {
            config.profile_name = profile.clone();
        }
        if let Some(dir) = &self.workspace {
            config.workspace_dir = dir.clone();
        }
        if let Some(dir) = &self.scripts_dir {
            config.scripts_dir = dir.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(strategy) = self.launch_strategy {
            config.launch_strategy = strategy.into();
        }
        config
    }

    /// Environment config with flags applied.
    pub fn resolve_config(&self) -> Result<BridgeConfig, CoreError> {
        Ok(self.apply(BridgeConfig::from_env()?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
