//! Resource model and per-kind adapters.
//!
//! This module contains the typed kinds the reconciler understands, their
//! static schemas, the JSON helpers used to read appliance records, and the
//! adapters that bind a desired state to the remote service.

mod adapter;
mod generic;
mod kind;
mod model;
pub mod value;

pub use adapter::{MutationCall, ResourceAdapter, SchemaAdapter};
pub use generic::{GenericAdapter, Lookup};
pub use kind::{
    ConditionalRequirement, FieldShape, FieldSpec, KindSchema, ResourceKind, SUCCESS_MARKER,
};
pub use model::{ListMutation, RemoteSnapshot, ResourceId, ResourceSpec, TargetState};
