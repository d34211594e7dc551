//! Integration tests for mapping errors to their `{ "error", "code" }` body.

use std::path::PathBuf;

use codesys_core::error::CoreError;
use codesys_server::error::AppError;

// ---------------------------------------------------------------------------
// Test: precondition failures keep their message
// ---------------------------------------------------------------------------

#[test]
fn precondition_errors_map_to_precondition_failed() {
    let body = AppError::from(CoreError::MissingParameter("CODESYS profile name")).to_body();
    assert_eq!(body.code, "PRECONDITION_FAILED");
    assert_eq!(body.error, "Missing parameter: CODESYS profile name was not provided");

    let body = AppError::from(CoreError::ExecutableNotFound(PathBuf::from("/x/CODESYS.exe"))).to_body();
    assert_eq!(body.code, "PRECONDITION_FAILED");
    assert!(body.error.contains("/x/CODESYS.exe"));
}

// ---------------------------------------------------------------------------
// Test: validation and template errors
// ---------------------------------------------------------------------------

#[test]
fn validation_error_carries_bare_message() {
    let body = AppError::from(CoreError::Validation("timeout must be positive".into())).to_body();
    assert_eq!(body.code, "VALIDATION_ERROR");
    assert_eq!(body.error, "timeout must be positive");
}

#[test]
fn template_error_names_the_template() {
    let body = AppError::from(CoreError::Template {
        name: "create_pou".into(),
        message: "not found".into(),
    })
    .to_body();
    assert_eq!(body.code, "TEMPLATE_ERROR");
    assert!(body.error.contains("'create_pou'"));
}

// ---------------------------------------------------------------------------
// Test: internal details are never sent back
// ---------------------------------------------------------------------------

#[test]
fn internal_errors_are_sanitized() {
    let errors = [
        AppError::from(CoreError::Internal("lock poisoned".into())),
        AppError::InternalError("encoder exploded".into()),
        AppError::from(std::io::Error::other("broken pipe")),
    ];
    for err in errors {
        let body = err.to_body();
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert_eq!(body.error, "An internal error occurred");
    }
}

// ---------------------------------------------------------------------------
// Test: protocol errors
// ---------------------------------------------------------------------------

#[test]
fn protocol_errors_map_to_their_codes() {
    let body = AppError::BadRequest("Invalid JSON: eof".into()).to_body();
    assert_eq!(body.code, "BAD_REQUEST");
    assert_eq!(body.error, "Invalid JSON: eof");

    let body = AppError::UnknownTool("frobnicate".into()).to_body();
    assert_eq!(body.code, "UNKNOWN_TOOL");
    assert_eq!(body.error, "Unknown tool: frobnicate");
}
