use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{InterpreterCandidate, InterpreterId},
    order_objects::CandidateQueryFilter,
};

/// Interpreter lookups used by the candidate query builder and the acceptance arbiter.
#[allow(async_fn_in_trait)]
pub trait CandidateDirectory: Clone {
    /// Runs the ranked candidate query for the given filter specification.
    ///
    /// Filters are conjunctive. The ranking tie-break order, ascending, is: communication-type priority,
    /// interpreting-type priority, scheduling-type priority, then rating descending, then earliest registered
    /// first. An empty result is a valid outcome and signals the scheduler to treat the wave as "no candidates".
    async fn find_candidates(&self, filter: CandidateQueryFilter) -> Result<Vec<InterpreterCandidate>, CandidateApiError>;

    /// True when the company has at least one active interpreter of its own, which makes the first search pass
    /// company-scoped.
    async fn company_has_interpreters(&self, company_id: &str) -> Result<bool, CandidateApiError>;

    /// The final arbiter at acceptance time: true when the interpreter holds no assigned order overlapping the
    /// given segment window.
    async fn is_available(
        &self,
        interpreter: InterpreterId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<bool, CandidateApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum CandidateApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for CandidateApiError {
    fn from(e: sqlx::Error) -> Self {
        CandidateApiError::DatabaseError(e.to_string())
    }
}
