//! `SqliteDatabase` is a concrete implementation of a matching engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, ensure_database_exists, groups, interpreters, jobs, new_pool, orders, run_migrations};
use crate::{
    db_types::{
        CandidateOutcome,
        GroupId,
        InterpreterCandidate,
        InterpreterId,
        InviteRecord,
        NewInterpreter,
        NewOrder,
        NewOrderGroup,
        Order,
        OrderGroup,
        OrderId,
        OrderStatusType,
        OutcomeRecord,
    },
    order_objects::{CandidateQueryFilter, OrderQueryFilter},
    timeframe::TimeFrame,
    traits::{
        CandidateApiError,
        CandidateDirectory,
        GroupAssignment,
        JobQueue,
        JobQueueError,
        MatchingDatabase,
        MatchingDbError,
        NewSearchJob,
        SearchJob,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl MatchingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder, frame: &TimeFrame) -> Result<(Order, bool), MatchingDbError> {
        let mut tx = self.pool.begin().await?;
        let (order, inserted) = orders::idempotent_insert(order, frame, &mut tx).await?;
        tx.commit().await?;
        if inserted {
            debug!("🗃️ Order [{}] has been saved in the DB with id {}", order.order_id, order.id);
        }
        Ok((order, inserted))
    }

    async fn insert_group(
        &self,
        group: NewOrderGroup,
        members: Vec<(NewOrder, TimeFrame)>,
    ) -> Result<(OrderGroup, Vec<Order>), MatchingDbError> {
        let mut tx = self.pool.begin().await?;
        if groups::fetch_group(&group.group_id, &mut tx).await?.is_some() {
            tx.rollback().await?;
            return Err(MatchingDbError::GroupAlreadyExists(group.group_id));
        }
        let group = groups::insert_group(group, &mut tx).await?;
        let mut saved = Vec::with_capacity(members.len());
        for (member, frame) in members {
            let (order, inserted) = orders::idempotent_insert(member, &frame, &mut tx).await?;
            if !inserted {
                tx.rollback().await?;
                return Err(MatchingDbError::OrderAlreadyExists(order.order_id));
            }
            saved.push(order);
        }
        tx.commit().await?;
        debug!("🗃️ Group {} saved with {} member order(s)", group.group_id, saved.len());
        Ok((group, saved))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_group(&self, group_id: &GroupId) -> Result<Option<OrderGroup>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        let group = groups::fetch_group(group_id, &mut conn).await?;
        Ok(group)
    }

    async fn fetch_group_members(&self, group_id: &GroupId) -> Result<Vec<Order>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        let members = groups::group_members(group_id, &mut conn).await?;
        Ok(members)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn try_assign_order(
        &self,
        order_id: &OrderId,
        interpreter: InterpreterId,
    ) -> Result<Option<Order>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::try_assign(order_id, interpreter, &mut conn).await?;
        if let Some(order) = &result {
            debug!("🗃️ Order [{}] is now assigned to {interpreter}", order.order_id);
        }
        Ok(result)
    }

    /// Assigns every live member of the group in one transaction. A member that slipped away between the
    /// coordinator's checks and this call aborts the whole transaction, so partial assignment never hits the disk.
    async fn try_assign_group(
        &self,
        group_id: &GroupId,
        interpreter: InterpreterId,
    ) -> Result<GroupAssignment, MatchingDbError> {
        let mut tx = self.pool.begin().await?;
        let group = groups::fetch_group(group_id, &mut tx)
            .await?
            .ok_or_else(|| MatchingDbError::GroupNotFound(group_id.clone()))?;
        if group.resolved_interpreter.is_some() || group.is_rejected {
            tx.rollback().await?;
            return Ok(GroupAssignment::Conflict { blocking_member: None });
        }
        let members = groups::group_members(group_id, &mut tx).await?;
        let live = members.iter().filter(|m| m.status == OrderStatusType::Searching).collect::<Vec<_>>();
        if live.is_empty() {
            tx.rollback().await?;
            return Ok(GroupAssignment::Conflict { blocking_member: None });
        }
        let mut assigned = Vec::with_capacity(live.len());
        for member in live {
            match orders::try_assign(&member.order_id, interpreter, &mut tx).await? {
                Some(order) => assigned.push(order),
                None => {
                    tx.rollback().await?;
                    return Ok(GroupAssignment::Conflict { blocking_member: Some(member.order_id.clone()) });
                },
            }
        }
        let group = match groups::mark_resolved(group_id, interpreter, &mut tx).await? {
            Some(group) => group,
            None => {
                tx.rollback().await?;
                return Ok(GroupAssignment::Conflict { blocking_member: None });
            },
        };
        tx.commit().await?;
        debug!("🗃️ Group {} resolved to {interpreter}; {} member(s) assigned", group.group_id, assigned.len());
        Ok(GroupAssignment::Assigned { group, members: assigned })
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<Option<Order>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::close_search(order_id, OrderStatusType::Cancelled, &mut conn).await
    }

    async fn expire_order(&self, order_id: &OrderId) -> Result<Option<Order>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::close_search(order_id, OrderStatusType::Expired, &mut conn).await
    }

    async fn open_wave(
        &self,
        order_id: &OrderId,
        started_at: DateTime<Utc>,
        frame: &TimeFrame,
    ) -> Result<Order, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::open_wave(order_id, started_at, frame, &mut conn).await
    }

    async fn latch_admin_notified(&self, order_id: &OrderId, at: DateTime<Utc>) -> Result<bool, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::latch_admin_notified(order_id, at, &mut conn).await
    }

    async fn record_invites(
        &self,
        order_id: &OrderId,
        wave: i64,
        interpreters: &[InterpreterId],
        sent_at: DateTime<Utc>,
    ) -> Result<(), MatchingDbError> {
        let mut tx = self.pool.begin().await?;
        orders::record_invites(order_id, wave, interpreters, sent_at, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_outcome(
        &self,
        order_id: &OrderId,
        interpreter: InterpreterId,
        outcome: CandidateOutcome,
        wave: i64,
    ) -> Result<(), MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::record_outcome(order_id, interpreter, outcome, wave, &mut conn).await
    }

    async fn fold_unanswered_invites(&self, order_id: &OrderId, wave: i64) -> Result<u64, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fold_unanswered_invites(order_id, wave, &mut conn).await
    }

    async fn outcomes_for_order(&self, order_id: &OrderId) -> Result<Vec<OutcomeRecord>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        let outcomes = orders::outcomes_for_order(order_id, &mut conn).await?;
        Ok(outcomes)
    }

    async fn invites_for_order(&self, order_id: &OrderId) -> Result<Vec<InviteRecord>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        let invites = orders::invites_for_order(order_id, &mut conn).await?;
        Ok(invites)
    }

    async fn reject_group_if_dead(&self, group_id: &GroupId) -> Result<Option<OrderGroup>, MatchingDbError> {
        let mut conn = self.pool.acquire().await?;
        groups::reject_if_dead(group_id, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), MatchingDbError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CandidateDirectory for SqliteDatabase {
    async fn find_candidates(
        &self,
        filter: CandidateQueryFilter,
    ) -> Result<Vec<InterpreterCandidate>, CandidateApiError> {
        let mut conn = self.pool.acquire().await?;
        interpreters::find_candidates(filter, &mut conn).await
    }

    async fn company_has_interpreters(&self, company_id: &str) -> Result<bool, CandidateApiError> {
        let mut conn = self.pool.acquire().await?;
        interpreters::company_has_interpreters(company_id, &mut conn).await
    }

    async fn is_available(
        &self,
        interpreter: InterpreterId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<bool, CandidateApiError> {
        let mut conn = self.pool.acquire().await?;
        interpreters::is_available(interpreter, starts_at, ends_at, &mut conn).await
    }
}

impl JobQueue for SqliteDatabase {
    async fn enqueue(&self, job: NewSearchJob) -> Result<(), JobQueueError> {
        let mut conn = self.pool.acquire().await?;
        jobs::enqueue(job, &mut conn).await
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<SearchJob>, JobQueueError> {
        let mut conn = self.pool.acquire().await?;
        jobs::claim_due(now, limit, &mut conn).await
    }

    async fn requeue_stranded(&self, now: DateTime<Utc>) -> Result<u64, JobQueueError> {
        let mut conn = self.pool.acquire().await?;
        jobs::requeue_stranded(now, &mut conn).await
    }

    async fn pending_count(&self) -> Result<i64, JobQueueError> {
        let mut conn = self.pool.acquire().await?;
        jobs::pending_count(&mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        ensure_database_exists(url).await?;
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        run_migrations(&self.pool).await
    }

    /// Registers an interpreter with their capability records. Mainly used by provisioning and the test suite;
    /// interpreter onboarding itself lives outside the matching engine.
    pub async fn register_interpreter(
        &self,
        interpreter: NewInterpreter,
    ) -> Result<InterpreterCandidate, CandidateApiError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CandidateApiError::DatabaseError(e.to_string()))?;
        let row = interpreters::insert_interpreter(interpreter, Utc::now(), &mut tx).await?;
        tx.commit().await.map_err(|e| CandidateApiError::DatabaseError(e.to_string()))?;
        debug!("🗃️ Interpreter {} registered as {}", row.display_name, row.id);
        Ok(row)
    }

    /// Blocks an interpreter from ever being offered this client's orders.
    pub async fn blacklist_interpreter(
        &self,
        customer_id: &str,
        interpreter: InterpreterId,
    ) -> Result<(), CandidateApiError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| CandidateApiError::DatabaseError(e.to_string()))?;
        interpreters::blacklist_interpreter(customer_id, interpreter, &mut conn).await
    }
}
