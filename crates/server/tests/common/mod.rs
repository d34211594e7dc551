use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codesys_core::config::{BridgeConfig, BUNDLED_SCRIPTS_DIR};
use codesys_core::scripting::command::LaunchSpec;
use codesys_core::scripting::materialize::ScriptMaterializer;
use codesys_core::scripting::{ProcessOutcome, ProcessRunner, ScriptInvoker};
use codesys_core::tools::ProjectTools;

/// Runner answering every launch with the same outcome.
#[derive(Debug, Default)]
pub struct CannedRunner {
    outcome: ProcessOutcome,
    calls: AtomicUsize,
}

impl CannedRunner {
    /// A run that printed `stdout` and exited with code 0.
    pub fn stdout(stdout: &str) -> Self {
        Self {
            outcome: ProcessOutcome {
                exit_code: Some(0),
                stdout: stdout.to_string(),
                ..ProcessOutcome::default()
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProcessRunner for CannedRunner {
    async fn run(&self, _spec: &LaunchSpec, _timeout: Duration) -> ProcessOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// A temp root holding a fake CODESYS install, a workspace and a scratch
/// directory for script files.
pub struct Fixture {
    pub root: tempfile::TempDir,
    pub config: BridgeConfig,
}

pub fn fixture() -> Fixture {
    let root = tempfile::tempdir().expect("temp dir");
    let common = root.path().join("CODESYS").join("Common");
    std::fs::create_dir_all(&common).expect("mkdir");
    let exe = common.join("CODESYS.exe");
    std::fs::write(&exe, b"").expect("fake exe");
    for dir in ["work", "tmp"] {
        std::fs::create_dir_all(root.path().join(dir)).expect("mkdir");
    }

    let config = BridgeConfig {
        codesys_path: exe,
        workspace_dir: root.path().join("work"),
        scripts_dir: PathBuf::from(BUNDLED_SCRIPTS_DIR),
        ..BridgeConfig::default()
    };
    Fixture { root, config }
}

/// Project tools over `runner`, writing scripts into the fixture's scratch
/// directory.
pub fn build_tools(fx: &Fixture, runner: CannedRunner) -> Arc<ProjectTools<CannedRunner>> {
    let invoker =
        ScriptInvoker::with_runner(runner, ScriptMaterializer::new(fx.root.path().join("tmp")));
    Arc::new(
        ProjectTools::with_invoker(invoker, &fx.config)
            .with_program_data(fx.root.path().join("pd")),
    )
}

/// Parse every line of serve output as JSON.
pub fn response_lines(output: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("response is JSON"))
        .collect()
}
