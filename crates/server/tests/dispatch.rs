//! Integration tests for request dispatch and the stdio serve loop.

mod common;

use common::{build_tools, fixture, response_lines, CannedRunner};
use codesys_server::dispatch::handle_line;
use codesys_server::stdio::serve;
use serde_json::{json, Value};

const STATUS_STDOUT: &str = "Project Open: True\nProject Name: Line1\nProject Path: c:\\work\\line1.project\nScripting OK: True\nSCRIPT_SUCCESS: Status check complete.\n";

// ---------------------------------------------------------------------------
// Test: check_status answers with rendered status content
// ---------------------------------------------------------------------------

#[tokio::test]
async fn check_status_returns_text_content() {
    let fx = fixture();
    let tools = build_tools(&fx, CannedRunner::stdout(STATUS_STDOUT));

    let resp = handle_line(&tools, r#"{"id": 1, "tool": "check_status"}"#).await;
    let json = serde_json::to_value(&resp).expect("serialize");

    assert_eq!(json["id"], 1);
    assert_eq!(json["isError"], false);
    assert_eq!(json["content"][0]["type"], "text");
    let text = json["content"][0]["text"].as_str().expect("text");
    assert!(text.contains("Project Name: Line1"));
    assert!(text.contains("Scripting OK: True"));
}

// ---------------------------------------------------------------------------
// Test: a script without the success marker is a tool error, not a protocol error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_success_marker_is_flagged_in_content() {
    let fx = fixture();
    let tools = build_tools(&fx, CannedRunner::stdout("Saved nothing\n"));

    let resp = handle_line(
        &tools,
        r#"{"id": "s", "tool": "save_project", "arguments": {"projectFilePath": "line1.project"}}"#,
    )
    .await;
    let json = serde_json::to_value(&resp).expect("serialize");

    assert_eq!(json["id"], "s");
    assert_eq!(json["isError"], true);
    let text = json["content"][0]["text"].as_str().expect("text");
    assert!(text.starts_with("Failed save project"));
}

// ---------------------------------------------------------------------------
// Test: blank project path never reaches CODESYS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_project_path_is_rejected_before_launch() {
    let fx = fixture();
    let tools = build_tools(&fx, CannedRunner::stdout("SCRIPT_SUCCESS"));

    let resp = handle_line(
        &tools,
        r#"{"id": 2, "tool": "open_project", "arguments": {"filePath": "   "}}"#,
    )
    .await;
    let json = serde_json::to_value(&resp).expect("serialize");

    assert_eq!(json["isError"], true);
    assert_eq!(json["content"][0]["text"], "Error: Project file path cannot be empty.");
    assert_eq!(tools.invoker().runner().calls(), 0);
}

// ---------------------------------------------------------------------------
// Test: protocol failures answer with an error object
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_tool_answers_with_error_object() {
    let fx = fixture();
    let tools = build_tools(&fx, CannedRunner::default());

    let resp = handle_line(&tools, r#"{"id": 9, "tool": "delete_everything"}"#).await;

    assert_eq!(
        serde_json::to_value(&resp).expect("serialize"),
        json!({ "id": 9, "error": { "error": "Unknown tool: delete_everything", "code": "UNKNOWN_TOOL" } })
    );
}

#[tokio::test]
async fn missing_required_argument_is_a_bad_request() {
    let fx = fixture();
    let tools = build_tools(&fx, CannedRunner::default());

    let resp = handle_line(
        &tools,
        r#"{"id": 4, "tool": "create_pou", "arguments": {"projectFilePath": "a.project", "name": "FB_X"}}"#,
    )
    .await;
    let json = serde_json::to_value(&resp).expect("serialize");

    assert_eq!(json["id"], 4);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn missing_executable_is_a_precondition_failure() {
    let mut fx = fixture();
    fx.config.codesys_path = fx.root.path().join("nowhere").join("CODESYS.exe");
    let tools = build_tools(&fx, CannedRunner::stdout("SCRIPT_SUCCESS"));

    let resp = handle_line(&tools, r#"{"id": 5, "tool": "check_status"}"#).await;
    let json = serde_json::to_value(&resp).expect("serialize");

    assert_eq!(json["error"]["code"], "PRECONDITION_FAILED");
    assert_eq!(tools.invoker().runner().calls(), 0);
}

#[tokio::test]
async fn missing_template_is_a_template_error() {
    let mut fx = fixture();
    let empty = fx.root.path().join("no-scripts");
    std::fs::create_dir_all(&empty).expect("mkdir");
    fx.config.scripts_dir = empty;
    let tools = build_tools(&fx, CannedRunner::stdout("SCRIPT_SUCCESS"));

    let resp = handle_line(&tools, r#"{"id": 6, "tool": "check_status"}"#).await;
    let json = serde_json::to_value(&resp).expect("serialize");

    assert_eq!(json["error"]["code"], "TEMPLATE_ERROR");
}

// ---------------------------------------------------------------------------
// Test: serve answers every non-blank line and ends when input closes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn serve_answers_each_request_line() {
    let fx = fixture();
    let tools = build_tools(&fx, CannedRunner::stdout(STATUS_STDOUT));
    let input = concat!(
        "{\"id\": 1, \"tool\": \"check_status\"}\n",
        "\n",
        "{not json\n",
        "{\"id\": 3, \"tool\": \"check_status\", \"arguments\": {}}\n",
    );
    let mut output = Vec::new();

    serve(tools.clone(), input.as_bytes(), &mut output)
        .await
        .expect("serve");

    let responses = response_lines(&output);
    assert_eq!(responses.len(), 3);

    let mut ids: Vec<Value> = responses.iter().map(|r| r["id"].clone()).collect();
    ids.sort_by_key(|id| id.as_i64().unwrap_or(-1));
    assert_eq!(ids, vec![Value::Null, json!(1), json!(3)]);

    let malformed = responses
        .iter()
        .find(|r| r["id"].is_null())
        .expect("error response");
    assert_eq!(malformed["error"]["code"], "BAD_REQUEST");
    assert_eq!(tools.invoker().runner().calls(), 2);
}

#[tokio::test]
async fn serve_with_empty_input_writes_nothing() {
    let fx = fixture();
    let tools = build_tools(&fx, CannedRunner::default());
    let mut output = Vec::new();

    serve(tools, &b""[..], &mut output).await.expect("serve");

    assert!(output.is_empty());
}
