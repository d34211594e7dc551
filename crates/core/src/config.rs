use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;
use crate::scripting::command::LaunchStrategy;
use crate::scripting::executor::DEFAULT_TIMEOUT;

/// Default CODESYS executable on a standard Windows install.
pub const DEFAULT_CODESYS_PATH: &str =
    "C:\\Program Files\\CODESYS 3.5.21.0\\CODESYS\\Common\\CODESYS.exe";

/// Default CODESYS profile.
pub const DEFAULT_CODESYS_PROFILE: &str = "CODESYS V3.5 SP21";

/// Template directory shipped with this crate.
pub const BUNDLED_SCRIPTS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/scripts");

/// Bridge configuration loaded from environment variables.
///
/// All fields have defaults matching a stock CODESYS 3.5 SP21 install.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Full path to `CODESYS.exe` (may contain spaces).
    pub codesys_path: PathBuf,
    /// CODESYS profile selecting the installed version.
    pub profile_name: String,
    /// Base directory for relative project paths.
    pub workspace_dir: PathBuf,
    /// Directory holding the `.py` script templates.
    pub scripts_dir: PathBuf,
    /// Wall-clock limit per CODESYS run.
    pub timeout: Duration,
    pub launch_strategy: LaunchStrategy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            codesys_path: PathBuf::from(DEFAULT_CODESYS_PATH),
            profile_name: DEFAULT_CODESYS_PROFILE.to_string(),
            workspace_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            scripts_dir: PathBuf::from(BUNDLED_SCRIPTS_DIR),
            timeout: DEFAULT_TIMEOUT,
            launch_strategy: LaunchStrategy::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                         |
    /// |---------------------------|---------------------------------|
    /// | `CODESYS_PATH`            | [`DEFAULT_CODESYS_PATH`]        |
    /// | `CODESYS_PROFILE`         | [`DEFAULT_CODESYS_PROFILE`]     |
    /// | `CODESYS_WORKSPACE`       | current directory               |
    /// | `CODESYS_SCRIPTS_DIR`     | [`BUNDLED_SCRIPTS_DIR`]         |
    /// | `CODESYS_TIMEOUT_SECS`    | `60`                            |
    /// | `CODESYS_LAUNCH_STRATEGY` | `argv`                          |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = value("CODESYS_PATH") {
            config.codesys_path = PathBuf::from(path);
        }
        if let Some(profile) = value("CODESYS_PROFILE") {
            config.profile_name = profile;
        }
        if let Some(dir) = value("CODESYS_WORKSPACE") {
            config.workspace_dir = PathBuf::from(dir);
        }
        if let Some(dir) = value("CODESYS_SCRIPTS_DIR") {
            config.scripts_dir = PathBuf::from(dir);
        }
        if let Some(secs) = value("CODESYS_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                CoreError::Validation(format!("CODESYS_TIMEOUT_SECS must be a whole number, got '{secs}'"))
            })?;
            if secs == 0 {
                return Err(CoreError::Validation(
                    "CODESYS_TIMEOUT_SECS must be greater than zero".to_string(),
                ));
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(strategy) = value("CODESYS_LAUNCH_STRATEGY") {
            config.launch_strategy = strategy.parse()?;
        }

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
