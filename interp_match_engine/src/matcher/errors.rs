use thiserror::Error;

use crate::{
    db_types::{GroupId, OrderId},
    traits::{CandidateApiError, JobQueueError, MatchingDbError},
};

#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("Storage error: {0}")]
    Database(#[from] MatchingDbError),
    #[error("Candidate directory error: {0}")]
    Candidates(#[from] CandidateApiError),
    #[error("Queue error: {0}")]
    Queue(#[from] JobQueueError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested group {0} does not exist")]
    GroupNotFound(GroupId),
    /// The candidate accepted after the order was assigned, expired or cancelled, or after a group member conflict.
    /// Reported to that candidate only; never a system error.
    #[error("Order {0} is no longer available")]
    AcceptanceConflict(OrderId),
    #[error("Order {0} is already in a terminal state")]
    OrderAlreadyTerminal(OrderId),
    /// An attempted partial assignment of a same-interpreter group. Never persisted; always rolled back.
    #[error("Group {0} cannot be partially assigned")]
    GroupConsistencyViolation(GroupId),
}
