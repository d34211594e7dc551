//! Launch specification for one CODESYS scripting run.
//!
//! The flag shape `--profile=<name> --noUI --runscript=<path>` is a fixed
//! contract with the CODESYS executable. Two ways of delivering it exist:
//!
//! - [`LaunchStrategy::ArgumentVector`] passes the executable as the process
//!   image and each flag as its own argument, with no shell in between. No
//!   re-quoting happens, so spaces in paths and profile names are safe as long
//!   as CODESYS accepts unquoted `--flag=value with spaces` tokens.
//! - [`LaunchStrategy::ShellString`] builds one command line with every value
//!   double-quoted and lets the platform shell parse it. This matches what a
//!   user types interactively, but any quote or metacharacter in a path or
//!   profile name would be reinterpreted by the shell, so those inputs are
//!   rejected up front.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Flag suppressing the CODESYS user interface.
pub const NO_UI_FLAG: &str = "--noUI";

/// Characters a shell would interpret inside or around a double-quoted value.
const SHELL_METACHARACTERS: &[char] = &[
    '"', '&', '|', '<', '>', '^', '%', '!', ';', '$', '`', '\n', '\r',
];

/// How the CODESYS command line is handed to the OS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStrategy {
    /// Executable plus a discrete argument vector, no shell.
    #[default]
    ArgumentVector,
    /// One quoted command string parsed by `cmd.exe` or `/bin/sh`.
    ShellString,
}

impl FromStr for LaunchStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "argv" | "argument_vector" | "args" => Ok(Self::ArgumentVector),
            "shell" | "shell_string" => Ok(Self::ShellString),
            other => Err(CoreError::Validation(format!(
                "Unknown launch strategy '{other}' (expected 'argv' or 'shell')"
            ))),
        }
    }
}

impl fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentVector => f.write_str("argv"),
            Self::ShellString => f.write_str("shell"),
        }
    }
}

/// Everything needed to spawn one process. Built fresh per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Process image: the CODESYS executable, or the shell.
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Always the directory containing the CODESYS executable.
    pub working_directory: PathBuf,
    /// Variables overriding the inherited environment for this spawn only.
    pub env: Vec<(OsString, OsString)>,
    /// Trailing argument passed verbatim, bypassing the runtime's own
    /// quoting. Only set for the shell strategy on Windows.
    pub raw_arg: Option<OsString>,
}

impl LaunchSpec {
    /// Human-readable command line for logs.
    pub fn display_command(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        if let Some(raw) = &self.raw_arg {
            line.push(' ');
            line.push_str(&raw.to_string_lossy());
        }
        line
    }
}

/// Directory containing the executable; `.` for a bare file name.
pub fn executable_dir(executable: &Path) -> PathBuf {
    match executable.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `dir` followed by every entry of `inherited`, joined with the platform
/// separator. Some CODESYS installs resolve sibling DLLs through the search
/// path rather than their own directory.
pub fn prepend_search_path(dir: &Path, inherited: Option<&OsStr>) -> Result<OsString, CoreError> {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(inherited) = inherited {
        entries.extend(std::env::split_paths(inherited));
    }
    std::env::join_paths(entries)
        .map_err(|e| CoreError::Validation(format!("Cannot build PATH for spawn: {e}")))
}

/// Build the launch spec for `executable` running `script` under `profile`.
///
/// `inherited_path` is the caller's `PATH` value; it is read, never mutated.
pub fn build_launch_spec(
    executable: &Path,
    profile: &str,
    script: &Path,
    strategy: LaunchStrategy,
    inherited_path: Option<&OsStr>,
) -> Result<LaunchSpec, CoreError> {
    let working_directory = executable_dir(executable);
    let search_path = prepend_search_path(&working_directory, inherited_path)?;
    let env = vec![(OsString::from("PATH"), search_path)];

    let (program, args, raw_arg) = match strategy {
        LaunchStrategy::ArgumentVector => (
            executable.to_path_buf(),
            vec![
                OsString::from(format!("--profile={profile}")),
                OsString::from(NO_UI_FLAG),
                {
                    let mut arg = OsString::from("--runscript=");
                    arg.push(script.as_os_str());
                    arg
                },
            ],
            None,
        ),
        LaunchStrategy::ShellString => {
            let line = shell_command_line(executable, profile, script)?;
            shell_invocation(line)
        }
    };

    Ok(LaunchSpec {
        program,
        args,
        working_directory,
        env,
        raw_arg,
    })
}

/// `"<exe>" --profile="<profile>" --noUI --runscript="<script>"`.
///
/// Fails if any value contains a shell metacharacter or a backslash that
/// could escape the closing quote; spaces are fine.
pub fn shell_command_line(
    executable: &Path,
    profile: &str,
    script: &Path,
) -> Result<String, CoreError> {
    let exe = executable.to_string_lossy();
    let script = script.to_string_lossy();
    ensure_shell_safe("executable path", &exe)?;
    ensure_shell_safe("profile name", profile)?;
    ensure_shell_safe("script path", &script)?;
    Ok(format!(
        "\"{exe}\" --profile=\"{profile}\" {NO_UI_FLAG} --runscript=\"{script}\""
    ))
}

fn ensure_shell_safe(what: &str, value: &str) -> Result<(), CoreError> {
    if let Some(c) = value.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(CoreError::Validation(format!(
            "{what} contains shell metacharacter {c:?}: {value}"
        )));
    }
    // `\"` is a literal quote to both the CRT argv parser and `/bin/sh`.
    if value.ends_with('\\') {
        return Err(CoreError::Validation(format!(
            "{what} must not end with a backslash: {value}"
        )));
    }
    // Inside double quotes `/bin/sh` treats a backslash as an escape.
    if cfg!(not(windows)) && value.contains('\\') {
        return Err(CoreError::Validation(format!(
            "{what} contains a backslash: {value}"
        )));
    }
    Ok(())
}

#[cfg(windows)]
fn shell_invocation(line: String) -> (PathBuf, Vec<OsString>, Option<OsString>) {
    // With /s, cmd strips exactly the outer pair of quotes and keeps the rest.
    (
        PathBuf::from("cmd.exe"),
        vec!["/d".into(), "/s".into(), "/c".into()],
        Some(format!("\"{line}\"").into()),
    )
}

#[cfg(not(windows))]
fn shell_invocation(line: String) -> (PathBuf, Vec<OsString>, Option<OsString>) {
    (PathBuf::from("/bin/sh"), vec!["-c".into(), line.into()], None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn exe() -> PathBuf {
        Path::new("/opt/CODESYS 3.5/Common").join("CODESYS.exe")
    }

    #[test]
    fn argument_vector_shape() {
        let spec = build_launch_spec(
            &exe(),
            "CODESYS V3.5 SP21",
            Path::new("/tmp/codesys_script_1_abc.py"),
            LaunchStrategy::ArgumentVector,
            None,
        )
        .expect("spec");

        assert_eq!(spec.program, exe());
        assert_eq!(
            spec.args,
            vec![
                OsString::from("--profile=CODESYS V3.5 SP21"),
                OsString::from("--noUI"),
                OsString::from("--runscript=/tmp/codesys_script_1_abc.py"),
            ]
        );
        assert_eq!(spec.working_directory, PathBuf::from("/opt/CODESYS 3.5/Common"));
    }

    #[test]
    fn path_is_prepended_not_replaced() {
        let inherited = std::env::join_paths(["/usr/bin", "/bin"]).expect("join");
        let spec = build_launch_spec(
            &exe(),
            "P",
            Path::new("/tmp/s.py"),
            LaunchStrategy::ArgumentVector,
            Some(&inherited),
        )
        .expect("spec");

        let (key, value) = spec.env.first().expect("PATH override");
        assert_eq!(key, "PATH");
        let entries: Vec<PathBuf> = std::env::split_paths(value).collect();
        assert_eq!(
            entries,
            vec![
                PathBuf::from("/opt/CODESYS 3.5/Common"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin"),
            ]
        );
    }

    #[test]
    fn bare_executable_runs_in_current_dir() {
        assert_eq!(executable_dir(Path::new("CODESYS.exe")), PathBuf::from("."));
    }

    #[cfg(windows)]
    #[test]
    fn shell_line_quotes_each_value() {
        let line = shell_command_line(
            Path::new("C:\\Program Files\\CODESYS\\CODESYS.exe"),
            "CODESYS V3.5 SP21",
            Path::new("C:\\Temp\\s.py"),
        )
        .expect("line");
        assert_eq!(
            line,
            "\"C:\\Program Files\\CODESYS\\CODESYS.exe\" --profile=\"CODESYS V3.5 SP21\" --noUI --runscript=\"C:\\Temp\\s.py\""
        );
    }

    #[test]
    fn shell_strategy_rejects_metacharacters() {
        let err = build_launch_spec(
            &exe(),
            "evil\" & del *",
            Path::new("/tmp/s.py"),
            LaunchStrategy::ShellString,
            None,
        );
        assert_matches!(err, Err(CoreError::Validation(_)));
    }

    #[cfg(not(windows))]
    #[test]
    fn shell_line_quotes_each_value() {
        let line = shell_command_line(
            Path::new("/opt/CODESYS 3.5/Common/CODESYS.exe"),
            "CODESYS V3.5 SP21",
            Path::new("/tmp/s.py"),
        )
        .expect("line");
        assert_eq!(
            line,
            "\"/opt/CODESYS 3.5/Common/CODESYS.exe\" --profile=\"CODESYS V3.5 SP21\" --noUI --runscript=\"/tmp/s.py\""
        );
    }

    #[test]
    fn shell_strategy_rejects_trailing_backslash() {
        let err = build_launch_spec(
            &exe(),
            "Profile\\",
            Path::new("/tmp/s.py"),
            LaunchStrategy::ShellString,
            None,
        );
        assert_matches!(err, Err(CoreError::Validation(ref m)) if m.contains("backslash"));
    }

    #[cfg(not(windows))]
    #[test]
    fn shell_strategy_rejects_any_backslash_off_windows() {
        let err = shell_command_line(&exe(), "CODESYS\\V3.5", Path::new("/tmp/s.py"));
        assert_matches!(err, Err(CoreError::Validation(_)));
    }

    #[test]
    fn argument_vector_accepts_trailing_backslash() {
        let spec = build_launch_spec(
            &exe(),
            "Profile\\",
            Path::new("/tmp/s.py"),
            LaunchStrategy::ArgumentVector,
            None,
        );
        assert!(spec.is_ok());
    }

    #[test]
    fn argument_vector_accepts_quotes_in_profile() {
        let spec = build_launch_spec(
            &exe(),
            "odd \"name\"",
            Path::new("/tmp/s.py"),
            LaunchStrategy::ArgumentVector,
            None,
        );
        assert!(spec.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn shell_strategy_wraps_in_sh() {
        let spec = build_launch_spec(
            &exe(),
            "P",
            Path::new("/tmp/s.py"),
            LaunchStrategy::ShellString,
            None,
        )
        .expect("spec");
        assert_eq!(spec.program, PathBuf::from("/bin/sh"));
        assert_eq!(spec.args.first(), Some(&OsString::from("-c")));
        assert_eq!(spec.working_directory, PathBuf::from("/opt/CODESYS 3.5/Common"));
    }

    #[test]
    fn strategy_parses_from_config_values() {
        assert_eq!("argv".parse::<LaunchStrategy>().ok(), Some(LaunchStrategy::ArgumentVector));
        assert_eq!("Shell".parse::<LaunchStrategy>().ok(), Some(LaunchStrategy::ShellString));
        assert!("powershell".parse::<LaunchStrategy>().is_err());
    }
}
