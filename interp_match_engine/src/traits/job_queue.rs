use std::fmt::Display;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{GroupId, OrderId};

//--------------------------------------      JobTarget        -------------------------------------------------------
/// What an "advance order search" job points at: a single order, or a group treated as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTarget {
    Order(OrderId),
    Group(GroupId),
}

impl JobTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            JobTarget::Order(_) => "order",
            JobTarget::Group(_) => "group",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            JobTarget::Order(id) => id.as_str(),
            JobTarget::Group(id) => id.as_str(),
        }
    }

    /// The exclusive-lock key for this target. One tick per key at a time.
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.kind(), self.key())
    }

    pub fn from_parts(kind: &str, key: String) -> Result<Self, JobQueueError> {
        match kind {
            "order" => Ok(JobTarget::Order(OrderId(key))),
            "group" => Ok(JobTarget::Group(GroupId(key))),
            other => Err(JobQueueError::MalformedJob(format!("unknown job kind: {other}"))),
        }
    }
}

impl Display for JobTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobTarget::Order(id) => write!(f, "order {id}"),
            JobTarget::Group(id) => write!(f, "group {id}"),
        }
    }
}

//--------------------------------------      SearchJob        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewSearchJob {
    pub target: JobTarget,
    pub run_at: DateTime<Utc>,
}

impl NewSearchJob {
    pub fn order(order_id: OrderId, run_at: DateTime<Utc>) -> Self {
        Self { target: JobTarget::Order(order_id), run_at }
    }

    pub fn group(group_id: GroupId, run_at: DateTime<Utc>) -> Self {
        Self { target: JobTarget::Group(group_id), run_at }
    }
}

#[derive(Debug, Clone)]
pub struct SearchJob {
    pub id: i64,
    pub target: JobTarget,
    pub run_at: DateTime<Utc>,
}

//--------------------------------------      JobQueue         -------------------------------------------------------
/// The durable queue the worker pool consumes. Waiting for a wave's response window is modelled as a scheduled
/// re-enqueue on this queue, never as a blocking sleep, so workers stay available for other orders.
#[allow(async_fn_in_trait)]
pub trait JobQueue: Clone {
    async fn enqueue(&self, job: NewSearchJob) -> Result<(), JobQueueError>;

    /// Atomically claims up to `limit` due jobs. A claimed job is removed from the queue; the tick logic itself is
    /// idempotent, so a worker death after a claim only delays the order until the stranded-order sweep.
    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<SearchJob>, JobQueueError>;

    /// Re-enqueues searching orders whose next deadline has passed but which have no queued job (a claim lost to a
    /// crashed worker). Returns the number of jobs restored.
    async fn requeue_stranded(&self, now: DateTime<Utc>) -> Result<u64, JobQueueError>;

    async fn pending_count(&self) -> Result<i64, JobQueueError>;
}

#[derive(Debug, Clone, Error)]
pub enum JobQueueError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Malformed job record: {0}")]
    MalformedJob(String),
}

impl From<sqlx::Error> for JobQueueError {
    fn from(e: sqlx::Error) -> Self {
        JobQueueError::DatabaseError(e.to_string())
    }
}
