//! Change planning for reconciliation.
//!
//! This module handles the comparison between desired attributes and the
//! appliance's current records, producing the payload to submit.

mod diff;

pub use diff::{DiffDetail, DiffEngine, UpdatePlan};
