//! CODESYS script invocation.
//!
//! Turns a block of automation-script text into one CODESYS `--runscript`
//! run and a pass/fail verdict. Everything here is independent of the
//! request/response layer so it can be exercised directly in tests.

pub mod classify;
pub mod command;
pub mod executor;
pub mod materialize;
pub mod subprocess;

pub use classify::{SCRIPT_ERROR_MARKER, SCRIPT_SUCCESS_MARKER};
pub use executor::{InvocationResult, ProcessOutcome, ProcessRunner, ScriptInvoker};
