//! Request parsing and tool dispatch for one line of input.
//!
//! Request: `{"id": <any>, "tool": "<name>", "arguments": {...}}`.
//!
//! A handled call answers with `{"id", "content": [{"type": "text", "text"}],
//! "isError"}`. Malformed requests, unknown tools and failures outside the
//! tool's own domain answer with `{"id", "error": {"error", "code"}}`.

use codesys_core::scripting::ProcessRunner;
use codesys_core::tools::{ProjectTools, ToolOutput, ToolRequest, TOOL_NAMES};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult, ErrorBody};

/// One incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub tool: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// A single text block of tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// One outgoing response line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Content {
        id: Value,
        content: Vec<TextContent>,
        #[serde(rename = "isError")]
        is_error: bool,
    },
    Error {
        id: Value,
        error: ErrorBody,
    },
}

impl Response {
    pub fn from_output(id: Value, output: ToolOutput) -> Self {
        Response::Content {
            id,
            content: vec![TextContent {
                kind: "text",
                text: output.text,
            }],
            is_error: output.is_error,
        }
    }

    pub fn from_error(id: Value, err: &AppError) -> Self {
        Response::Error {
            id,
            error: err.to_body(),
        }
    }

    pub fn id(&self) -> &Value {
        match self {
            Response::Content { id, .. } | Response::Error { id, .. } => id,
        }
    }
}

/// Parse a request line. On failure the id is recovered when possible so the
/// caller can still correlate the error.
pub fn parse_request(line: &str) -> Result<Request, (Value, AppError)> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| (Value::Null, AppError::BadRequest(format!("Invalid JSON: {e}"))))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| (id, AppError::BadRequest(format!("Invalid request: {e}"))))
}

/// Turn a request into a typed tool call.
pub fn to_tool_request(request: &Request) -> AppResult<ToolRequest> {
    if !TOOL_NAMES.contains(&request.tool.as_str()) {
        return Err(AppError::UnknownTool(request.tool.clone()));
    }
    let arguments = match &request.arguments {
        Some(Value::Null) | None => json!({}),
        Some(args) => args.clone(),
    };
    serde_json::from_value(json!({ "tool": request.tool, "arguments": arguments })).map_err(|e| {
        AppError::BadRequest(format!("Invalid arguments for {}: {e}", request.tool))
    })
}

/// Handle one input line end to end.
pub async fn handle_line<R: ProcessRunner>(tools: &ProjectTools<R>, line: &str) -> Response {
    let request = match parse_request(line) {
        Ok(request) => request,
        Err((id, err)) => {
            tracing::warn!(error = %err, "Rejected request");
            return Response::from_error(id, &err);
        }
    };

    let call = match to_tool_request(&request) {
        Ok(call) => call,
        Err(err) => {
            tracing::warn!(tool = %request.tool, error = %err, "Rejected request");
            return Response::from_error(request.id, &err);
        }
    };

    match tools.call(call).await {
        Ok(output) => Response::from_output(request.id, output),
        Err(core) => {
            let err = AppError::from(core);
            tracing::warn!(tool = %request.tool, error = %err, "Tool call failed");
            Response::from_error(request.id, &err)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn invalid_json_has_null_id() {
        let (id, err) = parse_request("{not json").expect_err("invalid");
        assert_eq!(id, Value::Null);
        assert_matches!(err, AppError::BadRequest(_));
    }

    #[test]
    fn id_survives_a_missing_tool_field() {
        let (id, err) = parse_request(r#"{"id": 7, "arguments": {}}"#).expect_err("invalid");
        assert_eq!(id, json!(7));
        assert_matches!(err, AppError::BadRequest(_));
    }

    #[test]
    fn unknown_tool_is_reported_by_name() {
        let req = parse_request(r#"{"id": "a", "tool": "format_disk"}"#).expect("parse");
        assert_matches!(to_tool_request(&req), Err(AppError::UnknownTool(ref n)) if n == "format_disk");
    }

    #[test]
    fn null_arguments_mean_none() {
        let req = parse_request(r#"{"id": 1, "tool": "check_status", "arguments": null}"#)
            .expect("parse");
        assert_matches!(to_tool_request(&req), Ok(ToolRequest::CheckStatus(_)));
    }

    #[test]
    fn bad_arguments_are_a_bad_request() {
        let req = parse_request(r#"{"id": 1, "tool": "open_project", "arguments": {"path": "x"}}"#)
            .expect("parse");
        assert_matches!(to_tool_request(&req), Err(AppError::BadRequest(ref m)) if m.starts_with("Invalid arguments for open_project"));
    }

    #[test]
    fn content_response_shape() {
        let resp = Response::from_output(json!(3), ToolOutput::error("nope"));
        assert_eq!(
            serde_json::to_value(&resp).expect("serialize"),
            json!({ "id": 3, "content": [{ "type": "text", "text": "nope" }], "isError": true })
        );
    }
}
