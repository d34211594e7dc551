//! Turn a [`ProcessOutcome`] into a single pass/fail verdict.
//!
//! CODESYS can exit 0 after a script failed logically, so the markers the
//! script prints itself outrank the exit code. A few failure classes (bad
//! quoting, a rejected profile argument, a script syntax error) look the same
//! at the exit-code level and are told apart by stderr substrings. Those
//! substrings live in [`STDERR_SIGNALS`] so the wording coupling to CODESYS
//! stays in one table.
//!
//! Signals are checked in a fixed order and the first match decides:
//!
//! 1. launch error
//! 2. timeout annotation
//! 3. [`STDERR_SIGNALS`], in table order
//! 4. success marker in stdout or stderr
//! 5. error marker in stdout or stderr
//! 6. exit code (0 succeeds)

use std::fmt;

use super::executor::{InvocationResult, ProcessOutcome};

/// Printed by a script that completed its work.
pub const SCRIPT_SUCCESS_MARKER: &str = "SCRIPT_SUCCESS";

/// Printed by a script that caught its own failure.
pub const SCRIPT_ERROR_MARKER: &str = "SCRIPT_ERROR";

/// Appended to stderr by the process runner when the timeout fires.
pub const TIMEOUT_MARKER: &str = "TIMEOUT: Process aborted due to timeout.";

/// Failure classes recognized from stderr text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The OS shell did not recognize the command; the command line was
    /// malformed, usually a path split at a space.
    CommandNotRecognized,
    /// CODESYS echoed its usage placeholder for the profile argument.
    ProfileArgument,
    /// The CODESYS script engine failed to parse the script.
    ScriptSyntax,
}

impl FailureReason {
    fn label(self) -> &'static str {
        match self {
            Self::CommandNotRecognized => "Command construction failed",
            Self::ProfileArgument => "CODESYS rejected the profile argument",
            Self::ScriptSyntax => "Script syntax error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the stderr signal table.
#[derive(Debug, Clone, Copy)]
pub struct StderrSignal {
    pub needle: &'static str,
    pub reason: FailureReason,
}

/// Known stderr substrings, most specific first.
pub const STDERR_SIGNALS: &[StderrSignal] = &[
    StderrSignal {
        needle: "is not recognized",
        reason: FailureReason::CommandNotRecognized,
    },
    StderrSignal {
        needle: "--profile=\"profile name\"",
        reason: FailureReason::ProfileArgument,
    },
    StderrSignal {
        needle: "SyntaxErrorException",
        reason: FailureReason::ScriptSyntax,
    },
];

/// First table entry whose needle occurs in `stderr`.
pub fn detect_stderr_signal(stderr: &str) -> Option<FailureReason> {
    STDERR_SIGNALS
        .iter()
        .find(|signal| stderr.contains(signal.needle))
        .map(|signal| signal.reason)
}

/// Which signal settled the verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictBasis {
    LaunchError,
    Timeout,
    Stderr(FailureReason),
    SuccessMarker,
    ErrorMarker,
    ExitCode(Option<i32>),
}

/// Verdict plus the stderr text as it should be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub success: bool,
    pub basis: VerdictBasis,
    pub stderr: String,
}

/// Evaluate the signals in priority order.
pub fn evaluate(outcome: &ProcessOutcome) -> Verdict {
    let stdout = outcome.stdout.as_str();
    let stderr = outcome.stderr.as_str();

    if let Some(err) = &outcome.launch_error {
        return Verdict {
            success: false,
            basis: VerdictBasis::LaunchError,
            stderr: format!("{SCRIPT_ERROR_MARKER}: Spawn failed: {err}\n{stderr}"),
        };
    }

    if outcome.exit_code.is_none() && stderr.contains(TIMEOUT_MARKER) {
        return Verdict {
            success: false,
            basis: VerdictBasis::Timeout,
            stderr: prefix_error(stderr, "Process timed out"),
        };
    }

    if let Some(reason) = detect_stderr_signal(stderr) {
        return Verdict {
            success: false,
            basis: VerdictBasis::Stderr(reason),
            stderr: prefix_error(stderr, reason.label()),
        };
    }

    if stdout.contains(SCRIPT_SUCCESS_MARKER) || stderr.contains(SCRIPT_SUCCESS_MARKER) {
        return Verdict {
            success: true,
            basis: VerdictBasis::SuccessMarker,
            stderr: stderr.to_string(),
        };
    }

    if stdout.contains(SCRIPT_ERROR_MARKER) || stderr.contains(SCRIPT_ERROR_MARKER) {
        return Verdict {
            success: false,
            basis: VerdictBasis::ErrorMarker,
            stderr: stderr.to_string(),
        };
    }

    // No markers. An exit code of 0 without markers counts as success.
    let basis = VerdictBasis::ExitCode(outcome.exit_code);
    if outcome.exit_code == Some(0) {
        return Verdict {
            success: true,
            basis,
            stderr: stderr.to_string(),
        };
    }

    let code = outcome
        .exit_code
        .map_or_else(|| "none".to_string(), |c| c.to_string());
    let stderr = if stderr.contains(SCRIPT_ERROR_MARKER) {
        stderr.to_string()
    } else {
        format!(
            "{SCRIPT_ERROR_MARKER}: Process failed with exit code {code} (no markers found).\n{stderr}"
        )
    };
    Verdict {
        success: false,
        basis,
        stderr,
    }
}

/// Classify `outcome` into the caller-facing result.
///
/// Pure: depends only on the exit code, both output streams and the launch
/// error.
pub fn classify(outcome: &ProcessOutcome) -> InvocationResult {
    let verdict = evaluate(outcome);
    tracing::info!(
        success = verdict.success,
        basis = ?verdict.basis,
        exit_code = ?outcome.exit_code,
        "Verdict determined",
    );

    let output = if verdict.success {
        outcome.stdout.clone()
    } else {
        format!("{}\n{}", verdict.stderr, outcome.stdout)
            .trim()
            .to_string()
    };

    InvocationResult {
        success: verdict.success,
        output,
    }
}

fn prefix_error(stderr: &str, label: &str) -> String {
    if stderr.contains(SCRIPT_ERROR_MARKER) {
        stderr.to_string()
    } else {
        format!("{SCRIPT_ERROR_MARKER}: {label}: {stderr}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
