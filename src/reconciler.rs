//! Reconciler for converging one resource to its desired state.
//!
//! Every reconciliation issues exactly one query call followed by at most
//! one mutate call. The control flow is shared by every kind; what differs
//! per kind lives behind [`ResourceAdapter`].

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Operation, ReconcileError, Result, ServiceError};
use crate::planner::DiffDetail;
use crate::resource::{
    ListMutation, MutationCall, RemoteSnapshot, ResourceAdapter, ResourceId, TargetState,
};
use crate::service::{DiagnosticCapture, OperationStatus, RemoteConfigService, extract_status};

/// Parameters of one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileRequest {
    /// State to converge to.
    pub target: TargetState,
    /// Decide without mutating.
    pub dry_run: bool,
    /// How desired lists combine with existing ones.
    pub list_mutation: ListMutation,
}

impl ReconcileRequest {
    /// Creates a request for a target state.
    #[must_use]
    pub const fn new(target: TargetState) -> Self {
        Self {
            target,
            dry_run: false,
            list_mutation: ListMutation::Replace,
        }
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the list mutation mode.
    #[must_use]
    pub const fn with_list_mutation(mut self, list_mutation: ListMutation) -> Self {
        self.list_mutation = list_mutation;
        self
    }
}

/// Mutation chosen for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Nothing to do.
    None,
    /// Create the resource.
    Create,
    /// Update the resource.
    Update,
    /// Delete the resource.
    Delete,
}

impl From<&MutationCall> for Action {
    fn from(call: &MutationCall) -> Self {
        match call {
            MutationCall::Create(_) => Self::Create,
            MutationCall::Update(_) => Self::Update,
            MutationCall::Delete(_) => Self::Delete,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// Result of reconciling one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationOutcome {
    /// Resource identity.
    pub resource: ResourceId,
    /// Requested target state.
    pub target: TargetState,
    /// Whether a mutation was applied, or would be in dry run.
    pub changed: bool,
    /// Mutation chosen.
    pub action: Action,
    /// Remote view after the reconciliation.
    ///
    /// In dry run this is the snapshot as queried.
    pub snapshot: RemoteSnapshot,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Per-attribute differences behind an update.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diff: Vec<DiffDetail>,
}

impl std::fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match (self.changed, self.dry_run) {
            (false, _) => "unchanged",
            (true, true) => "would change",
            (true, false) => "changed",
        };
        write!(f, "{} [{}]: {verb}", self.resource, self.target)?;
        if self.action != Action::None {
            write!(f, " ({})", self.action)?;
        }
        for detail in &self.diff {
            write!(f, "\n  {detail}")?;
        }
        Ok(())
    }
}

/// Lifecycle phase of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unqueried,
    Queried,
    Noop,
    Mutating,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unqueried => "unqueried",
            Self::Queried => "queried",
            Self::Noop => "noop",
            Self::Mutating => "mutating",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Tracks and logs phase transitions.
struct Progress<'r> {
    resource: &'r str,
    phase: Phase,
}

impl<'r> Progress<'r> {
    const fn new(resource: &'r str) -> Self {
        Self {
            resource,
            phase: Phase::Unqueried,
        }
    }

    fn advance(&mut self, to: Phase) {
        debug!("{}: {} -> {}", self.resource, self.phase, to);
        self.phase = to;
    }
}

/// What the reconciler decided after the query.
enum Decision {
    Noop,
    Mutate {
        call: MutationCall,
        after: RemoteSnapshot,
        diff: Vec<DiffDetail>,
    },
}

/// Reconciler for a single resource against a remote service.
pub struct Reconciler<'a> {
    /// Remote configuration service.
    service: &'a dyn RemoteConfigService,
}

impl<'a> Reconciler<'a> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(service: &'a dyn RemoteConfigService) -> Self {
        Self { service }
    }

    /// Reconciles one resource.
    ///
    /// # Errors
    ///
    /// Returns an error if a required attribute is missing, an update
    /// targets a resource that does not exist, a service call fails, or the
    /// appliance does not report success for the mutation.
    pub async fn reconcile<A: ResourceAdapter + ?Sized>(
        &self,
        adapter: &A,
        request: &ReconcileRequest,
    ) -> Result<ReconciliationOutcome> {
        let id = adapter.id();
        let resource = id.to_string();
        let mut progress = Progress::new(&resource);

        info!("Reconciling {} (target: {})", resource, request.target);

        let snapshot = self.query(adapter, &resource).await?;
        progress.advance(Phase::Queried);

        let mut outcome = ReconciliationOutcome {
            resource: id.clone(),
            target: request.target,
            changed: false,
            action: Action::None,
            snapshot,
            dry_run: request.dry_run,
            diff: Vec::new(),
        };

        let (call, after, diff) = match Self::decide(adapter, request, &outcome.snapshot, &resource)? {
            Decision::Noop => {
                progress.advance(Phase::Noop);
                debug!("{} already converged", resource);
                progress.advance(Phase::Done);
                return Ok(outcome);
            }
            Decision::Mutate { call, after, diff } => (call, after, diff),
        };

        outcome.changed = true;
        outcome.action = Action::from(&call);
        outcome.diff = diff;

        if request.dry_run {
            info!("Dry run: would {} {}", outcome.action, resource);
            progress.advance(Phase::Done);
            return Ok(outcome);
        }

        progress.advance(Phase::Mutating);
        self.mutate(adapter, &call, &resource).await?;
        outcome.snapshot = after;
        progress.advance(Phase::Done);

        Ok(outcome)
    }

    /// Fetches the current snapshot.
    async fn query<A: ResourceAdapter + ?Sized>(
        &self,
        adapter: &A,
        resource: &str,
    ) -> Result<RemoteSnapshot> {
        debug!("Querying {}", resource);
        match adapter.fetch(self.service).await {
            Ok(record) => Ok(RemoteSnapshot::Present(record)),
            Err(ServiceError::NotFound { .. }) => {
                debug!("{} does not exist", resource);
                Ok(RemoteSnapshot::Absent)
            }
            Err(source) => Err(ReconcileError::Service {
                operation: Operation::Query,
                resource: resource.to_string(),
                source,
                diagnostics: Vec::new(),
            }
            .into()),
        }
    }

    fn decide<A: ResourceAdapter + ?Sized>(
        adapter: &A,
        request: &ReconcileRequest,
        snapshot: &RemoteSnapshot,
        resource: &str,
    ) -> Result<Decision> {
        let decision = match (request.target, snapshot) {
            (TargetState::Query, _)
            | (TargetState::Present, RemoteSnapshot::Present(_))
            | (TargetState::Absent, RemoteSnapshot::Absent) => Decision::Noop,

            (TargetState::Present, RemoteSnapshot::Absent) => {
                let payload = adapter
                    .create_payload(request.list_mutation)
                    .map_err(|missing| precondition(Operation::Create, resource, missing))?;
                Decision::Mutate {
                    call: MutationCall::Create(payload.clone()),
                    after: RemoteSnapshot::Present(payload),
                    diff: Vec::new(),
                }
            }

            (TargetState::Absent, RemoteSnapshot::Present(record)) => {
                let name = adapter.delete_name(record).ok_or_else(|| {
                    precondition(Operation::Delete, resource, vec![String::from("name")])
                })?;
                Decision::Mutate {
                    call: MutationCall::Delete(name),
                    after: RemoteSnapshot::Absent,
                    diff: Vec::new(),
                }
            }

            (TargetState::Updated, RemoteSnapshot::Absent) => {
                return Err(ReconcileError::NotFound {
                    operation: Operation::Update,
                    resource: resource.to_string(),
                }
                .into());
            }

            (TargetState::Updated, RemoteSnapshot::Present(record)) => {
                let plan = adapter.plan_update(record, request.list_mutation);
                if !plan.changed {
                    return Ok(Decision::Noop);
                }
                for detail in &plan.details {
                    debug!("{}: {}", resource, detail);
                }
                Decision::Mutate {
                    call: MutationCall::Update(plan.payload.clone()),
                    after: RemoteSnapshot::Present(plan.payload),
                    diff: plan.details,
                }
            }
        };
        Ok(decision)
    }

    /// Issues the mutation and classifies the appliance's response.
    async fn mutate<A: ResourceAdapter + ?Sized>(
        &self,
        adapter: &A,
        call: &MutationCall,
        resource: &str,
    ) -> Result<()> {
        let operation = call.operation();
        info!("Applying {} to {}", operation, resource);

        let diagnostics = DiagnosticCapture::new(operation, resource);
        let response = adapter.apply(self.service, call, &diagnostics).await;
        let lines = diagnostics.finish();

        let response = match response {
            Ok(response) => response,
            Err(source) => {
                return Err(ReconcileError::Service {
                    operation,
                    resource: resource.to_string(),
                    source,
                    diagnostics: lines,
                }
                .into());
            }
        };

        match extract_status(&response, &adapter.id().tag, adapter.success_marker()) {
            OperationStatus::Success => {
                for line in &lines {
                    debug!("{}: {}", resource, line);
                }
                info!("{} {} applied", operation, resource);
                Ok(())
            }
            status => {
                warn!("{} {} rejected: {}", operation, resource, status);
                Err(ReconcileError::Rejected {
                    operation,
                    resource: resource.to_string(),
                    status: status.to_string(),
                    diagnostics: lines,
                }
                .into())
            }
        }
    }
}

fn precondition(operation: Operation, resource: &str, missing: Vec<String>) -> ReconcileError {
    ReconcileError::Precondition {
        operation,
        resource: resource.to_string(),
        missing,
    }
}
