use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        CandidateOutcome,
        GroupId,
        InterpreterId,
        InviteRecord,
        NewOrder,
        NewOrderGroup,
        Order,
        OrderGroup,
        OrderId,
        OutcomeRecord,
    },
    order_objects::OrderQueryFilter,
    timeframe::TimeFrame,
    traits::GroupAssignment,
};

/// This trait defines the highest level of behaviour for storage backends supporting the matching engine.
///
/// This behaviour includes:
/// * Creating orders and order groups, idempotently.
/// * The order life cycle: the compare-and-set status transitions that arbitrate acceptance races, cancellation and
///   expiry.
/// * Wave bookkeeping: opening waves, recording invitations and per-candidate outcomes.
/// * The escalation latch, which guarantees the admin warning fires exactly once per order.
#[allow(async_fn_in_trait)]
pub trait MatchingDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order together with its initial time frame, in a single atomic transaction.
    /// This call is idempotent. Returns `false` in the second element if the order already existed.
    async fn insert_order(&self, order: NewOrder, frame: &TimeFrame) -> Result<(Order, bool), MatchingDbError>;

    /// Stores a group and all of its member orders in a single atomic transaction. Members are stamped with the
    /// group id. Fails if the group already exists.
    async fn insert_group(
        &self,
        group: NewOrderGroup,
        members: Vec<(NewOrder, TimeFrame)>,
    ) -> Result<(OrderGroup, Vec<Order>), MatchingDbError>;

    /// Returns the last entry in the orders table for the corresponding `order_id`.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, MatchingDbError>;

    async fn fetch_group(&self, group_id: &GroupId) -> Result<Option<OrderGroup>, MatchingDbError>;

    /// The member orders of a group, ordered by segment start time.
    async fn fetch_group_members(&self, group_id: &GroupId) -> Result<Vec<Order>, MatchingDbError>;

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MatchingDbError>;

    /// The single-writer compare-and-set on order status: `Searching → Assigned`.
    ///
    /// Returns the updated order, or `None` if the order was no longer `Searching` (the caller lost the race and
    /// must report "no longer available" to the candidate).
    async fn try_assign_order(
        &self,
        order_id: &OrderId,
        interpreter: InterpreterId,
    ) -> Result<Option<Order>, MatchingDbError>;

    /// Assigns every live member of a group to the given interpreter, atomically, and records the group's resolved
    /// interpreter. If any member cannot be assigned, the whole transaction rolls back and a conflict is returned.
    /// A partially assigned group is never persisted.
    async fn try_assign_group(
        &self,
        group_id: &GroupId,
        interpreter: InterpreterId,
    ) -> Result<GroupAssignment, MatchingDbError>;

    /// `Searching → Cancelled`. Returns `None` if the order was already terminal.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<Option<Order>, MatchingDbError>;

    /// `Searching → Expired`. Returns `None` if the order was already terminal.
    async fn expire_order(&self, order_id: &OrderId) -> Result<Option<Order>, MatchingDbError>;

    /// Opens the next wave: increments the wave counter and persists the advanced time frame.
    async fn open_wave(
        &self,
        order_id: &OrderId,
        started_at: DateTime<Utc>,
        frame: &TimeFrame,
    ) -> Result<Order, MatchingDbError>;

    /// Sets the escalation latch. Returns `true` only for the caller that actually set it; every later call is a
    /// no-op returning `false`, which is how the admin warning fires exactly once.
    async fn latch_admin_notified(&self, order_id: &OrderId, at: DateTime<Utc>) -> Result<bool, MatchingDbError>;

    /// Records the invitations sent for a wave.
    async fn record_invites(
        &self,
        order_id: &OrderId,
        wave: i64,
        interpreters: &[InterpreterId],
        sent_at: DateTime<Utc>,
    ) -> Result<(), MatchingDbError>;

    /// Records a per-candidate outcome. `Declined` is permanent for the order; an existing `Declined` is never
    /// downgraded to `Ignored`.
    async fn record_outcome(
        &self,
        order_id: &OrderId,
        interpreter: InterpreterId,
        outcome: CandidateOutcome,
        wave: i64,
    ) -> Result<(), MatchingDbError>;

    /// Folds every invitation of the given wave that has no recorded outcome into `Ignored`. Called when the wave's
    /// response window has elapsed. Returns the number of candidates written off.
    async fn fold_unanswered_invites(&self, order_id: &OrderId, wave: i64) -> Result<u64, MatchingDbError>;

    async fn outcomes_for_order(&self, order_id: &OrderId) -> Result<Vec<OutcomeRecord>, MatchingDbError>;

    async fn invites_for_order(&self, order_id: &OrderId) -> Result<Vec<InviteRecord>, MatchingDbError>;

    /// Marks the group rejected once every member is terminal and none is assigned. Returns the updated group when
    /// this call performed the transition, `None` otherwise.
    async fn reject_group_if_dead(&self, group_id: &GroupId) -> Result<Option<OrderGroup>, MatchingDbError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MatchingDbError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MatchingDbError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("Cannot insert group, since it already exists with id {0}")]
    GroupAlreadyExists(GroupId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested group {0} does not exist")]
    GroupNotFound(GroupId),
}

impl From<sqlx::Error> for MatchingDbError {
    fn from(e: sqlx::Error) -> Self {
        MatchingDbError::DatabaseError(e.to_string())
    }
}
