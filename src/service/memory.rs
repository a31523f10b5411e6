//! In-memory appliance backed by a JSON snapshot file.
//!
//! `MemoryConfigService` behaves like the appliance's configuration API for
//! the calls the reconciler makes: records are stamped with transaction
//! metadata, duplicate creates are rejected through the status block, and
//! every call is recorded so callers can inspect what was issued.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, RampartError, Result, ServiceError, ServiceResult};
use crate::resource::value::{list_items, record_name, scalar_text};
use crate::resource::{ResourceId, SUCCESS_MARKER};

use super::diagnostics::DiagnosticCapture;
use super::remote::{RawOperation, RemoteConfigService};
use super::response::OperationResponse;

/// Status text for a create whose name is already taken.
const DUPLICATE_ENTITY: &str = "Operation failed. Entity having same name already exists.";

/// Status text for an update of a record that does not exist.
const MISSING_ENTITY: &str = "Operation could not be performed on Entity.";

/// Status text for a nameless write to a tag holding several records.
const AMBIGUOUS_ENTITY: &str = "Operation failed. Entity name is required.";

/// Kind of call issued against the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `get`.
    Get,
    /// `get_filtered`.
    GetFiltered,
    /// `create`.
    Create,
    /// `update`.
    Update,
    /// `delete`.
    Delete,
    /// `submit_raw`.
    SubmitRaw,
}

impl CallKind {
    /// Returns true for calls that may change appliance state.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !matches!(self, Self::Get | Self::GetFiltered)
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCall {
    /// Call kind.
    pub kind: CallKind,
    /// Tag addressed.
    pub tag: String,
    /// Record name addressed, if any.
    pub name: Option<String>,
}

/// In-memory appliance configuration store.
#[derive(Debug, Default)]
pub struct MemoryConfigService {
    /// Appliance state and call log.
    state: Mutex<ApplianceState>,
}

#[derive(Debug, Default)]
struct ApplianceState {
    records: BTreeMap<String, Vec<Value>>,
    calls: Vec<ServiceCall>,
    pending_failure: Option<ServiceError>,
    pending_mutation_failure: Option<ServiceError>,
    pending_rejection: Option<(String, String)>,
    transactions: u64,
}

impl MemoryConfigService {
    /// Creates an empty appliance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record under a tag.
    #[must_use]
    pub fn with_record(self, tag: &str, record: Value) -> Self {
        self.insert(tag, record);
        self
    }

    /// Adds a record under a tag, stamping it like the appliance would.
    pub fn insert(&self, tag: &str, record: Value) {
        let mut state = self.lock();
        let stamped = state.stamp(&record);
        state.records.entry(tag.to_string()).or_default().push(stamped);
    }

    /// Loads an appliance snapshot from a JSON file.
    ///
    /// The file maps tags to a record or a list of records. A missing file
    /// is an empty appliance.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Snapshot {} does not exist, starting empty", path.display());
            return Ok(Self::new());
        }

        info!("Loading appliance snapshot from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| snapshot_error(path, &e))?;
        let raw: BTreeMap<String, Value> =
            serde_json::from_str(&content).map_err(|e| snapshot_error(path, &e))?;

        let service = Self::new();
        {
            let mut state = service.lock();
            for (tag, value) in raw {
                let records = list_items(Some(&value));
                debug!("Loaded {} {} record(s)", records.len(), tag);
                state.records.insert(tag, records);
            }
        }
        Ok(service)
    }

    /// Writes the current records to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = {
            let state = self.lock();
            serde_json::to_string_pretty(&state.records).map_err(|e| snapshot_error(path, &e))?
        };
        std::fs::write(path, content).map_err(|e| snapshot_error(path, &e))?;
        info!("Saved appliance snapshot to: {}", path.display());
        Ok(())
    }

    /// Returns all records stored under a tag.
    #[must_use]
    pub fn records(&self, tag: &str) -> Vec<Value> {
        self.lock().records.get(tag).cloned().unwrap_or_default()
    }

    /// Returns the named record under a tag.
    #[must_use]
    pub fn find(&self, tag: &str, name: &str) -> Option<Value> {
        self.lock()
            .records
            .get(tag)
            .and_then(|records| records.iter().find(|r| has_name(r, name)).cloned())
    }

    /// Returns every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    /// Returns the number of read calls recorded so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| !c.kind.is_mutation()).count()
    }

    /// Returns the number of mutating calls recorded so far.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.kind.is_mutation()).count()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Makes the next call fail with the given error.
    pub fn fail_next(&self, error: ServiceError) {
        self.lock().pending_failure = Some(error);
    }

    /// Makes the next mutating call fail with the given error.
    ///
    /// Read calls before it are unaffected.
    pub fn fail_next_mutation(&self, error: ServiceError) {
        self.lock().pending_mutation_failure = Some(error);
    }

    /// Makes the next mutation return the given status instead of applying.
    pub fn reject_next(&self, code: &str, message: &str) {
        self.lock().pending_rejection = Some((code.to_string(), message.to_string()));
    }

    fn lock(&self) -> MutexGuard<'_, ApplianceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, tag: &str, name: Option<&str>) -> ServiceResult<Value> {
        let mut state = self.lock();
        state.begin(CallKind::Get, tag, name)?;

        let missing = || ServiceError::not_found(identity(tag, name));
        let records = state
            .records
            .get(tag)
            .filter(|records| !records.is_empty())
            .ok_or_else(missing)?;

        match name {
            Some(name) => records
                .iter()
                .find(|r| has_name(r, name))
                .cloned()
                .ok_or_else(missing),
            None if records.len() == 1 => Ok(records[0].clone()),
            None => Ok(Value::Array(records.clone())),
        }
    }

    fn read_filtered(&self, tag: &str, key: &str, value: &str) -> ServiceResult<Value> {
        let mut state = self.lock();
        state.begin(CallKind::GetFiltered, tag, None)?;

        state
            .records
            .get(tag)
            .and_then(|records| {
                records
                    .iter()
                    .find(|r| r.get(key).and_then(scalar_text).as_deref() == Some(value))
            })
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("{tag}[{key}={value}]")))
    }

    fn write(
        &self,
        kind: CallKind,
        tag: &str,
        name: Option<&str>,
        record: &Value,
        upsert: bool,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse> {
        let mut state = self.lock();
        diagnostics.record(format!("{} {}", if upsert { "set" } else { "add" }, identity(tag, name)));
        state.begin(kind, tag, name).inspect_err(|e| diagnostics.record(format!("error: {e}")))?;

        if let Some(response) = state.take_rejection(tag, diagnostics) {
            return Ok(response);
        }

        let stamped = state.stamp(record);
        let records = state.records.entry(tag.to_string()).or_default();
        let position = name.and_then(|n| records.iter().position(|r| has_name(r, n)));

        let outcome = match (name, position, upsert) {
            (Some(_), Some(_), false) => Err(DUPLICATE_ENTITY),
            (Some(_), None, false) => {
                records.push(stamped);
                Ok(())
            }
            (Some(_), Some(index), true) => {
                records[index] = stamped;
                Ok(())
            }
            (Some(_), None, true) => Err(MISSING_ENTITY),
            (None, _, _) if records.len() > 1 => Err(AMBIGUOUS_ENTITY),
            (None, _, _) => {
                records.clear();
                records.push(stamped);
                Ok(())
            }
        };

        Ok(match outcome {
            Ok(()) => respond(tag, "200", SUCCESS_MARKER, diagnostics),
            Err(message) => respond(tag, if upsert { "541" } else { "502" }, message, diagnostics),
        })
    }

    fn remove(
        &self,
        tag: &str,
        name: &str,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse> {
        let mut state = self.lock();
        diagnostics.record(format!("remove {}", identity(tag, Some(name))));
        state
            .begin(CallKind::Delete, tag, Some(name))
            .inspect_err(|e| diagnostics.record(format!("error: {e}")))?;

        if let Some(response) = state.take_rejection(tag, diagnostics) {
            return Ok(response);
        }

        let records = state
            .records
            .get_mut(tag)
            .ok_or_else(|| ServiceError::not_found(identity(tag, Some(name))))?;
        let index = records
            .iter()
            .position(|r| has_name(r, name))
            .ok_or_else(|| ServiceError::not_found(identity(tag, Some(name))))?;
        records.remove(index);

        Ok(respond(tag, "200", SUCCESS_MARKER, diagnostics))
    }
}

impl ApplianceState {
    /// Records the call and fails it if a failure was primed.
    fn begin(&mut self, kind: CallKind, tag: &str, name: Option<&str>) -> ServiceResult<()> {
        debug!("{:?} {}", kind, identity(tag, name));
        self.calls.push(ServiceCall {
            kind,
            tag: tag.to_string(),
            name: name.map(String::from),
        });
        if kind.is_mutation()
            && let Some(error) = self.pending_mutation_failure.take()
        {
            return Err(error);
        }
        self.pending_failure.take().map_or(Ok(()), Err)
    }

    fn take_rejection(
        &mut self,
        tag: &str,
        diagnostics: &DiagnosticCapture,
    ) -> Option<OperationResponse> {
        self.pending_rejection
            .take()
            .map(|(code, message)| respond(tag, &code, &message, diagnostics))
    }

    fn stamp(&mut self, record: &Value) -> Value {
        self.transactions += 1;
        let mut map = match record {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        map.insert(
            String::from("@transactionid"),
            Value::String(self.transactions.to_string()),
        );
        Value::Object(map)
    }
}

fn respond(
    tag: &str,
    code: &str,
    message: &str,
    diagnostics: &DiagnosticCapture,
) -> OperationResponse {
    diagnostics.record(format!("status {code}: {message}"));
    OperationResponse::with_status(tag, code, message)
}

fn has_name(record: &Value, name: &str) -> bool {
    record_name(record).as_deref() == Some(name)
}

fn identity(tag: &str, name: Option<&str>) -> String {
    ResourceId {
        tag: tag.to_string(),
        name: name.map(String::from),
    }
    .to_string()
}

fn snapshot_error(path: &Path, error: &dyn std::fmt::Display) -> RampartError {
    RampartError::Config(ConfigError::Snapshot {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}

#[async_trait]
impl RemoteConfigService for MemoryConfigService {
    async fn get(&self, tag: &str, name: Option<&str>) -> ServiceResult<Value> {
        self.read(tag, name)
    }

    async fn get_filtered(&self, tag: &str, key: &str, value: &str) -> ServiceResult<Value> {
        self.read_filtered(tag, key, value)
    }

    async fn create(
        &self,
        tag: &str,
        record: &Value,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse> {
        let name = record_name(record);
        self.write(CallKind::Create, tag, name.as_deref(), record, false, diagnostics)
    }

    async fn update(
        &self,
        tag: &str,
        name: Option<&str>,
        record: &Value,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse> {
        self.write(CallKind::Update, tag, name, record, true, diagnostics)
    }

    async fn delete(
        &self,
        tag: &str,
        name: &str,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse> {
        self.remove(tag, name, diagnostics)
    }

    async fn submit_raw(
        &self,
        tag: &str,
        payload: &Value,
        operation: RawOperation,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse> {
        let name = record_name(payload);
        let upsert = operation == RawOperation::Update;
        self.write(CallKind::SubmitRaw, tag, name.as_deref(), payload, upsert, diagnostics)
    }
}
