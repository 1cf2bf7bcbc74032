//! Create/update operations and the cache keys they invalidate.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{Backend, Failure, FailureKind};
use crate::cache::{QueryCache, QueryPrefix, Resource};
use crate::models::{
    ApplicationStatus, ApplicationSummary, ApplicationUpdate, ExamSubject, NewExamSubject,
    NewStaffMember, StaffMember,
};
use crate::notify::{Notification, Notifier};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateExamSubject(NewExamSubject),
    UpdateExamSubject { id: i64, subject: NewExamSubject },
    UpdateApplication { id: i64, update: ApplicationUpdate },
    SetApplicationStatus { id: i64, status: ApplicationStatus },
    CreateStaffMember(NewStaffMember),
}

impl Mutation {
    /// Cache families that must be re-read once this write succeeds.
    pub fn dependents(&self) -> Vec<QueryPrefix> {
        match self {
            Mutation::CreateExamSubject(_) | Mutation::UpdateExamSubject { .. } => {
                vec![QueryPrefix::all(Resource::ExamSubjects)]
            }
            Mutation::UpdateApplication { .. } => vec![QueryPrefix::all(Resource::Applications)],
            // Status drives the dashboard counts too
            Mutation::SetApplicationStatus { .. } => vec![
                QueryPrefix::all(Resource::Applications),
                QueryPrefix::all(Resource::Statistics),
            ],
            Mutation::CreateStaffMember(_) => vec![QueryPrefix::all(Resource::Staff)],
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Mutation::CreateExamSubject(_) => "Exam subject created",
            Mutation::UpdateExamSubject { .. } => "Exam subject updated",
            Mutation::UpdateApplication { .. } => "Application updated",
            Mutation::SetApplicationStatus { .. } => "Application status changed",
            Mutation::CreateStaffMember(_) => "Staff member added",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Mutation::CreateExamSubject(_) => "create_exam_subject",
            Mutation::UpdateExamSubject { .. } => "update_exam_subject",
            Mutation::UpdateApplication { .. } => "update_application",
            Mutation::SetApplicationStatus { .. } => "set_application_status",
            Mutation::CreateStaffMember(_) => "create_staff_member",
        }
    }
}

/// What the server returned for an acknowledged write.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    ExamSubject(ExamSubject),
    Application(ApplicationSummary),
    StaffMember(StaffMember),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", .0.kind.user_message())]
pub struct MutationError(pub Failure);

impl MutationError {
    pub fn kind(&self) -> FailureKind {
        self.0.kind
    }
}

/// Performs writes, then invalidates dependent queries and notifies.
#[derive(Clone)]
pub struct MutationDispatcher {
    backend: Arc<dyn Backend>,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
}

impl MutationDispatcher {
    pub fn new(backend: Arc<dyn Backend>, cache: QueryCache, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            cache,
            notifier,
        }
    }

    /// Run one write. The cache is only touched after the server has
    /// acknowledged it; failures leave the cache as it was and are not retried.
    pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome, MutationError> {
        match self.backend.write(&mutation).await {
            Ok(receipt) => {
                let invalidated: usize = mutation
                    .dependents()
                    .iter()
                    .map(|prefix| self.cache.invalidate(prefix))
                    .sum();
                info!(mutation = mutation.name(), invalidated, "Mutation applied");
                self.notifier
                    .notify(Notification::success(mutation.success_message()));
                Ok(receipt)
            }
            Err(e) => {
                let failure = e.to_failure();
                warn!(mutation = mutation.name(), error = %e, "Mutation failed");
                self.notifier
                    .notify(Notification::error(failure.kind.user_message()));
                Err(MutationError(failure))
            }
        }
    }
}
