//! Extract structured data from script stdout.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

pub const STRUCTURE_START_MARKER: &str = "--- PROJECT STRUCTURE START ---";
pub const STRUCTURE_END_MARKER: &str = "--- PROJECT STRUCTURE END ---";
pub const DECLARATION_START_MARKER: &str = "### POU DECLARATION START ###";
pub const DECLARATION_END_MARKER: &str = "### POU DECLARATION END ###";
pub const IMPLEMENTATION_START_MARKER: &str = "### POU IMPLEMENTATION START ###";
pub const IMPLEMENTATION_END_MARKER: &str = "### POU IMPLEMENTATION END ###";

/// Printed by the CODESYS build when compilation finishes.
pub const COMPILE_COMPLETE_MARKER: &str = "Compile complete --";

static STATUS_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+):\s*(.*)$").expect("valid regex"));

/// Error count of a clean build, as it appears in the completion line.
const ZERO_ERRORS_TEXT: &str = " 0 error(s),";

/// `Key: Value` pairs from every non-blank line. Later keys win.
pub fn status_fields(output: &str) -> HashMap<String, String> {
    output
        .split(['\r', '\n'])
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            STATUS_LINE_RE
                .captures(line)
                .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()))
        })
        .collect()
}

/// Human-readable status summary.
pub fn render_status(fields: &HashMap<String, String>) -> String {
    let field = |key: &str, default: &'static str| {
        fields.get(key).map(String::as_str).unwrap_or(default).to_string()
    };
    format!(
        "CODESYS Status:\n - Scripting OK: {}\n - Project Open: {}\n - Project Name: {}\n - Project Path: {}",
        field("Scripting OK", "Unknown"),
        field("Project Open", "Unknown"),
        field("Project Name", "Unknown"),
        field("Project Path", "N/A"),
    )
}

/// True when the status fields report a working scripting engine.
pub fn scripting_ok(fields: &HashMap<String, String>) -> bool {
    fields
        .get("Scripting OK")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Text between the first `start` and the first `end`, with literal `\n`
/// sequences turned into newlines and surrounding whitespace trimmed.
pub fn section_between(output: &str, start: &str, end: &str) -> Option<String> {
    let start_idx = output.find(start)?;
    let end_idx = output.find(end)?;
    if start_idx >= end_idx {
        return None;
    }
    let body = output.get(start_idx + start.len()..end_idx)?;
    Some(body.replace("\\n", "\n").trim().to_string())
}

pub fn project_structure(output: &str) -> Option<String> {
    section_between(output, STRUCTURE_START_MARKER, STRUCTURE_END_MARKER)
}

/// Declaration and implementation text of one POU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PouCode {
    pub declaration: Option<String>,
    pub implementation: Option<String>,
}

impl PouCode {
    pub fn parse(output: &str) -> Self {
        Self {
            declaration: section_between(output, DECLARATION_START_MARKER, DECLARATION_END_MARKER),
            implementation: section_between(
                output,
                IMPLEMENTATION_START_MARKER,
                IMPLEMENTATION_END_MARKER,
            ),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "// ----- Declaration -----\n{}\n\n// ----- Implementation -----\n{}",
            self.declaration
                .as_deref()
                .unwrap_or("/* Declaration not found in output */"),
            self.implementation
                .as_deref()
                .unwrap_or("/* Implementation not found in output */"),
        )
    }
}

/// The build log reports completion with a nonzero error count.
pub fn has_compile_errors(output: &str) -> bool {
    output.contains(COMPILE_COMPLETE_MARKER) && !output.contains(ZERO_ERRORS_TEXT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
