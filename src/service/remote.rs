//! Remote configuration service trait definition.
//!
//! This is the capability surface the reconciler consumes. Transport,
//! session handling and wire marshalling live behind it.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceResult;

use super::diagnostics::DiagnosticCapture;
use super::response::OperationResponse;

/// Operation carried by a raw submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawOperation {
    /// Add a new record.
    Create,
    /// Replace an existing record.
    Update,
}

impl std::fmt::Display for RawOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "add"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// Typed read/write access to the appliance configuration.
///
/// Reads return [`ServiceError::NotFound`](crate::error::ServiceError::NotFound)
/// when nothing matches. Mutations return the appliance's structured
/// response; whether the change was applied is decided by the caller from
/// that response, not from the call succeeding.
#[async_trait]
pub trait RemoteConfigService: Send + Sync {
    /// Reads a named record, or the whole tag when `name` is `None`.
    async fn get(&self, tag: &str, name: Option<&str>) -> ServiceResult<Value>;

    /// Reads the first record whose `key` field equals `value`.
    async fn get_filtered(&self, tag: &str, key: &str, value: &str) -> ServiceResult<Value>;

    /// Creates a record from a full attribute set.
    async fn create(
        &self,
        tag: &str,
        record: &Value,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse>;

    /// Replaces a record with a full attribute set.
    async fn update(
        &self,
        tag: &str,
        name: Option<&str>,
        record: &Value,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse>;

    /// Deletes a named record.
    async fn delete(
        &self,
        tag: &str,
        name: &str,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse>;

    /// Submits a caller-supplied payload for a tag without a dedicated schema.
    async fn submit_raw(
        &self,
        tag: &str,
        payload: &Value,
        operation: RawOperation,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse>;
}
