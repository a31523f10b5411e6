//! Remote configuration service integration.
//!
//! This module defines the capability surface the reconciler consumes,
//! the appliance's response shape, scoped diagnostic capture, and an
//! in-memory appliance used offline and in tests.

mod diagnostics;
mod memory;
mod remote;
mod response;

pub use diagnostics::DiagnosticCapture;
pub use memory::{CallKind, MemoryConfigService, ServiceCall};
pub use remote::{RawOperation, RemoteConfigService};
pub use response::{OperationResponse, OperationStatus, extract_status};
