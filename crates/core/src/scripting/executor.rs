//! Invocation facade and shared types.
//!
//! [`ScriptInvoker::invoke`] is the single entry point the rest of the system
//! calls: it materializes the script, builds the launch spec, runs CODESYS
//! through a [`ProcessRunner`], classifies the outcome and removes the temp
//! file. Apart from precondition failures it always resolves to an
//! [`InvocationResult`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::classify::{self, SCRIPT_ERROR_MARKER};
use super::command::{self, LaunchSpec, LaunchStrategy};
use super::materialize::ScriptMaterializer;
use super::subprocess::SystemProcessRunner;
use crate::error::CoreError;

/// Default wall-clock limit for one CODESYS run. 30 seconds proved too
/// aggressive for project opens on a cold CODESYS instance.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Characters of the script body echoed to the debug log.
const SCRIPT_LOG_PREVIEW_CHARS: usize = 500;

/// The three parameters of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub script_body: String,
    pub executable_path: PathBuf,
    pub profile_name: String,
}

impl InvocationRequest {
    /// Check all fields are present and the executable exists on disk.
    pub async fn validate(&self) -> Result<(), CoreError> {
        if self.script_body.is_empty() {
            return Err(CoreError::MissingParameter("script body"));
        }
        if self.executable_path.as_os_str().is_empty() {
            return Err(CoreError::MissingParameter("CODESYS executable path"));
        }
        if self.profile_name.is_empty() {
            return Err(CoreError::MissingParameter("CODESYS profile name"));
        }
        match tokio::fs::metadata(&self.executable_path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(CoreError::ExecutableNotFound(self.executable_path.clone())),
        }
    }
}

/// Why a process could not be started at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnError {
    pub kind: io::ErrorKind,
    pub message: String,
}

impl From<&io::Error> for SpawnError {
    fn from(err: &io::Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything captured from one process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `None` when the process timed out, was killed, or never started.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Set when the OS refused to start the process; no script ran.
    pub launch_error: Option<SpawnError>,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl ProcessOutcome {
    /// Outcome for a process that never started.
    pub fn launch_failed(err: SpawnError) -> Self {
        Self {
            launch_error: Some(err),
            ..Self::default()
        }
    }
}

/// The only value callers see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub success: bool,
    /// Stdout alone on success; stderr then stdout on failure.
    pub output: String,
}

impl InvocationResult {
    /// Failure synthesized by the facade itself, not by classification.
    pub fn setup_failure(message: impl fmt::Display) -> Self {
        Self {
            success: false,
            output: format!("{SCRIPT_ERROR_MARKER}: Failed during script execution setup: {message}"),
        }
    }
}

/// Starts one external process and reports what happened.
///
/// Implemented by [`SystemProcessRunner`] for real spawns; tests substitute
/// their own runners.
pub trait ProcessRunner: Send + Sync {
    /// Run `spec` to completion or until `timeout` elapses.
    fn run(
        &self,
        spec: &LaunchSpec,
        timeout: Duration,
    ) -> impl std::future::Future<Output = ProcessOutcome> + Send;
}

/// Runs CODESYS scripts and classifies their results.
#[derive(Debug, Clone)]
pub struct ScriptInvoker<R = SystemProcessRunner> {
    runner: R,
    materializer: ScriptMaterializer,
    strategy: LaunchStrategy,
    timeout: Duration,
}

impl ScriptInvoker<SystemProcessRunner> {
    /// Invoker using real processes and the OS temp directory.
    pub fn new() -> Self {
        Self::with_runner(SystemProcessRunner::default(), ScriptMaterializer::in_temp_dir())
    }
}

impl Default for ScriptInvoker<SystemProcessRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProcessRunner> ScriptInvoker<R> {
    pub fn with_runner(runner: R, materializer: ScriptMaterializer) -> Self {
        Self {
            runner,
            materializer,
            strategy: LaunchStrategy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_strategy(mut self, strategy: LaunchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn strategy(&self) -> LaunchStrategy {
        self.strategy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `script_body` inside CODESYS.
    ///
    /// Returns `Err` only for precondition failures (missing parameter,
    /// executable not on disk), which are detected before anything touches
    /// the filesystem or spawns a process. Every later failure is reported as
    /// an unsuccessful [`InvocationResult`].
    pub async fn invoke(
        &self,
        script_body: &str,
        executable_path: &Path,
        profile_name: &str,
    ) -> Result<InvocationResult, CoreError> {
        let request = InvocationRequest {
            script_body: script_body.to_string(),
            executable_path: executable_path.to_path_buf(),
            profile_name: profile_name.to_string(),
        };
        request.validate().await?;
        Ok(self.invoke_validated(&request).await)
    }

    async fn invoke_validated(&self, request: &InvocationRequest) -> InvocationResult {
        let preview: String = request
            .script_body
            .chars()
            .take(SCRIPT_LOG_PREVIEW_CHARS)
            .collect();
        tracing::debug!(script = %preview, "Script content to be written");

        let script = match self.materializer.materialize(&request.script_body).await {
            Ok(script) => script,
            Err(e) => {
                tracing::error!(error = %e, "Failed to write temp script");
                return InvocationResult::setup_failure(e);
            }
        };

        let inherited_path = std::env::var_os("PATH");
        let mut result = match command::build_launch_spec(
            &request.executable_path,
            &request.profile_name,
            script.path(),
            self.strategy,
            inherited_path.as_deref(),
        ) {
            Ok(spec) => {
                tracing::info!(
                    command = %spec.display_command(),
                    cwd = %spec.working_directory.display(),
                    strategy = %self.strategy,
                    "Spawning CODESYS",
                );
                let outcome = self.runner.run(&spec, self.timeout).await;
                classify::classify(&outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build launch spec");
                InvocationResult::setup_failure(e)
            }
        };

        let path = script.path().to_path_buf();
        if let Err(warning) = script.release().await {
            if result.success {
                result.output.push_str(&format!(
                    "\nWARNING: Failed to delete temporary script file {}. {warning}",
                    path.display()
                ));
            }
        }

        tracing::info!(
            success = result.success,
            output_len = result.output.len(),
            "Invocation finished",
        );
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
