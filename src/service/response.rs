//! Appliance operation responses and status extraction.
//!
//! A mutation that reaches the appliance can still fail: the appliance
//! reports the outcome in a status block keyed by the tag that was
//! submitted. [`extract_status`] is the only code that knows that shape.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::resource::value::scalar_text;

/// Structured response to a create, update, delete or raw submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse {
    /// Response body as returned by the appliance.
    pub body: Value,
}

/// Outcome reported by the appliance for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// The exact success marker was present.
    Success,
    /// Anything else, including a missing status block.
    Failure {
        /// Appliance status code, if reported.
        code: Option<String>,
        /// Status text, or a description of what was missing.
        message: String,
    },
}

impl OperationResponse {
    /// Wraps a raw response body.
    #[must_use]
    pub const fn new(body: Value) -> Self {
        Self { body }
    }

    /// Builds a response carrying a single status block for `tag`.
    #[must_use]
    pub fn with_status(tag: &str, code: &str, message: &str) -> Self {
        Self::new(json!({
            tag: { "Status": { "@code": code, "#text": message } }
        }))
    }
}

impl OperationStatus {
    /// Returns true on success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure {
                code: Some(code),
                message,
            } => write!(f, "{message} (code {code})"),
            Self::Failure {
                code: None,
                message,
            } => write!(f, "{message}"),
        }
    }
}

/// Reads the status the appliance reported for `tag`.
///
/// The body may be wrapped in a `Response` envelope. The entry for the tag
/// may be a single status block or a list of them (one per submitted
/// record); every block must carry `marker` for the call to count as a
/// success.
#[must_use]
pub fn extract_status(response: &OperationResponse, tag: &str, marker: &str) -> OperationStatus {
    let body = response.body.get("Response").unwrap_or(&response.body);

    let Some(entry) = body.get(tag) else {
        return OperationStatus::Failure {
            code: None,
            message: format!("response has no status for {tag}"),
        };
    };

    let blocks: Vec<&Value> = match entry {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    if blocks.is_empty() {
        return OperationStatus::Failure {
            code: None,
            message: format!("response has no status for {tag}"),
        };
    }

    for block in blocks {
        let (code, message) = read_status(block);
        if message.as_deref() != Some(marker) {
            return OperationStatus::Failure {
                code,
                message: message.unwrap_or_else(|| format!("status for {tag} has no text")),
            };
        }
    }

    OperationStatus::Success
}

/// Returns `(code, text)` from a status block.
///
/// Accepts `{"Status": {"@code": .., "#text": ..}}`, `{"Status": "text"}`
/// and a bare status object.
fn read_status(block: &Value) -> (Option<String>, Option<String>) {
    let status = block.get("Status").unwrap_or(block);
    match status {
        Value::Object(map) => (
            map.get("@code").and_then(scalar_text),
            map.get("#text").and_then(scalar_text),
        ),
        other => (None, scalar_text(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::SUCCESS_MARKER;

    #[test]
    fn test_success_marker() {
        let response = OperationResponse::with_status("IPHostGroup", "200", SUCCESS_MARKER);
        assert!(extract_status(&response, "IPHostGroup", SUCCESS_MARKER).is_success());
    }

    #[test]
    fn test_enveloped_response() {
        let response = OperationResponse::new(json!({
            "Response": { "@APIVersion": "1905.1", "IPHost": { "Status": { "@code": "200", "#text": SUCCESS_MARKER } } }
        }));
        assert!(extract_status(&response, "IPHost", SUCCESS_MARKER).is_success());
    }

    #[test]
    fn test_partial_failure_is_failure() {
        let response = OperationResponse::with_status(
            "FirewallRule",
            "500",
            "Operation could not be performed on Entity.",
        );

        let status = extract_status(&response, "FirewallRule", SUCCESS_MARKER);
        assert_eq!(
            status,
            OperationStatus::Failure {
                code: Some(String::from("500")),
                message: String::from("Operation could not be performed on Entity."),
            }
        );
    }

    #[test]
    fn test_missing_status_block_is_failure() {
        let response = OperationResponse::new(json!({ "Login": { "status": "Authentication Successful" } }));
        assert!(!extract_status(&response, "IPHost", SUCCESS_MARKER).is_success());
    }

    #[test]
    fn test_status_for_other_tag_is_failure() {
        let response = OperationResponse::with_status("IPHost", "200", SUCCESS_MARKER);
        assert!(!extract_status(&response, "IPHostGroup", SUCCESS_MARKER).is_success());
    }

    #[test]
    fn test_every_block_must_succeed() {
        let response = OperationResponse::new(json!({
            "Services": [
                { "Status": { "@code": "200", "#text": SUCCESS_MARKER } },
                { "Status": { "@code": "502", "#text": "Operation failed. Entity having same name already exists." } }
            ]
        }));

        let status = extract_status(&response, "Services", SUCCESS_MARKER);
        assert!(!status.is_success());
        assert!(status.to_string().contains("code 502"));
    }

    #[test]
    fn test_plain_text_status() {
        let response = OperationResponse::new(json!({ "Time": { "Status": SUCCESS_MARKER } }));
        assert!(extract_status(&response, "Time", SUCCESS_MARKER).is_success());
    }
}
