// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Rampart
//!
//! A declarative, idempotent configuration reconciler for network firewall appliances.
//!
//! ## Overview
//!
//! Rampart converges firewall objects (hosts, host groups, services, rules,
//! and device-wide settings) to a desired state, allowing you to:
//!
//! - Declare the appliance configuration in a YAML manifest
//! - See exactly which resources would change before touching anything
//! - Merge lists into what is already configured instead of overwriting it
//! - Re-run safely: a converged resource is never mutated again
//!
//! ## Architecture
//!
//! Every resource goes through the same reconciliation:
//!
//! 1. **Query**: Read the current record from the appliance
//! 2. **Decide**: Compare it with the desired state for the requested target
//! 3. **Mutate**: Issue at most one create, update or delete, and check the
//!    appliance's status block for the success marker
//!
//! ## Modules
//!
//! - [`config`]: Manifest parsing and validation
//! - [`resource`]: Resource kinds, schemas and adapters
//! - [`planner`]: Diff computation and payload construction
//! - [`service`]: Remote configuration service and the in-memory appliance
//! - [`reconciler`]: Single-resource reconciliation engine
//! - [`converger`]: Manifest runner
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! appliance:
//!   name: edge-fw
//!
//! resources:
//!   - kind: ip_host_group
//!     name: GRP1
//!     state: updated
//!     list_mutation: add
//!     attributes:
//!       hosts: [H1, H2]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod converger;
pub mod error;
pub mod planner;
pub mod reconciler;
pub mod resource;
pub mod service;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{Manifest, ManifestParser, ManifestValidator};
pub use converger::{Converger, RunReport};
pub use error::{RampartError, Result};
pub use planner::DiffEngine;
pub use reconciler::{ReconcileRequest, ReconciliationOutcome, Reconciler};
pub use resource::{GenericAdapter, ResourceAdapter, ResourceKind, ResourceSpec, SchemaAdapter};
pub use service::{MemoryConfigService, RemoteConfigService};
