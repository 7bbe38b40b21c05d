//! The search wave scheduler.
//!
//! One tick drives one order (or one group, treated as a unit) through the state machine
//! `Searching → (Assigned | Escalated → Assigned | Exhausted | Cancelled)`. Ticks are fired by queue jobs at the
//! order's next deadline; waiting for a wave's response window is a re-enqueue, never a sleep. A per-target
//! exclusive lock guarantees that no two ticks run for the same order concurrently.

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{CandidateOutcome, GroupId, Order, OrderGroup, OrderId},
    matcher::{candidates::candidate_filter, dispatch::DispatchNotifier, errors::MatchingError, MatchFlowApi},
    order_objects::GroupSnapshot,
    realtime::{RealtimeEvent, UserRoleId},
    traits::{CandidateDirectory, InviteTransport, JobQueue, JobTarget, MatchingDatabase, NewSearchJob},
};

//--------------------------------------     SearchContext     -------------------------------------------------------
/// The ephemeral working set for one scheduling pass. Constructed at the start of a tick for a single order,
/// discarded at the end of it, and never shared across orders. Group searches only add fields, so the group case
/// is a variant rather than a subtype.
#[derive(Debug, Clone)]
pub enum SearchContext {
    Order(OrderContext),
    Group(GroupContext),
}

#[derive(Debug, Clone)]
pub struct OrderContext {
    pub order: Order,
    /// The company-scoped first pass has already run.
    pub is_first_search_completed: bool,
    /// The marketplace-wide second pass has already run.
    pub is_second_search_completed: bool,
    pub is_search_needed: bool,
    pub send_notifications: bool,
    /// The admin warning is due on this pass.
    pub set_red_flags: bool,
    pub company_has_interpreters: bool,
    pub time_to_restart: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct GroupContext {
    pub base: OrderContext,
    pub group: OrderGroup,
}

impl SearchContext {
    pub fn order_ctx(&self) -> &OrderContext {
        match self {
            SearchContext::Order(ctx) => ctx,
            SearchContext::Group(ctx) => &ctx.base,
        }
    }
}

//--------------------------------------      TickOutcome      -------------------------------------------------------
/// What a single scheduler tick did. Mostly interesting to the worker loop and the test suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The job pointed at an order or group that does not exist. Logged and dropped.
    Missing,
    /// The order was already assigned, cancelled or expired. A tick for a terminal order is a no-op.
    AlreadyTerminal,
    /// The search window closed without an acceptance; the order is now `Expired`.
    Expired,
    /// The admin warning fired on this tick and nothing else was due.
    Escalated,
    /// Nothing was due yet; the tick re-queued itself for the next deadline.
    Waiting,
    /// A new invitation wave was opened.
    WaveDispatched { wave: i64, invited: usize },
    /// A group bookkeeping pass ran.
    GroupEvaluated { rejected: bool },
}

impl<B, T> MatchFlowApi<B, T>
where
    B: MatchingDatabase + CandidateDirectory + JobQueue,
    T: InviteTransport,
{
    /// Runs one scheduler tick for the given target, at the given instant.
    ///
    /// The tick is executed under the target's exclusive lock and is safe to repeat: a stale or duplicate job
    /// falls through to a no-op.
    pub async fn run_search_tick(&self, target: JobTarget, now: DateTime<Utc>) -> Result<TickOutcome, MatchingError> {
        let _guard = self.locks.acquire(&target.lock_key()).await;
        match &target {
            JobTarget::Order(order_id) => self.order_tick(order_id, now).await,
            JobTarget::Group(group_id) => self.group_tick(group_id, now).await,
        }
    }

    async fn order_tick(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<TickOutcome, MatchingError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            warn!("🔁️ Tick for unknown order [{order_id}]; dropping the job");
            return Ok(TickOutcome::Missing);
        };
        if order.is_terminal() {
            debug!("🔁️ Tick for order [{order_id}], which is already {}. Nothing to do.", order.status);
            return Ok(TickOutcome::AlreadyTerminal);
        }
        // The previous wave's response window is over: everyone who never answered is written off as Ignored.
        // They stay eligible for the next wave; only an explicit decline is permanent.
        if order.current_wave > 0 {
            let ignored = self.db.fold_unanswered_invites(order_id, order.current_wave).await?;
            if ignored > 0 {
                debug!("🔁️ Wave {} of [{order_id}]: {ignored} invitation(s) went unanswered", order.current_wave);
            }
        }
        let frame = order.time_frame();
        if frame.is_exhausted(now) {
            return self.exhaust_order(&order, now).await;
        }
        let mut escalated = false;
        if frame.admin_due(now) && !order.admin_notified() {
            escalated = self.escalate_order(&order, now).await?;
        }
        let admin_latched = order.admin_notified() || escalated;
        if frame.remaining_repeats == 0 {
            // The repeat budget is spent. Hold the order open until the window closes or someone accepts.
            self.db.enqueue(NewSearchJob::order(order_id.clone(), frame.next_tick_at(admin_latched))).await?;
            return Ok(if escalated { TickOutcome::Escalated } else { TickOutcome::Waiting });
        }
        if let Some(due) = frame.next_repeat_at {
            if now < due {
                // Woken early, e.g. for the admin warning. The next wave is not due yet.
                self.db.enqueue(NewSearchJob::order(order_id.clone(), frame.next_tick_at(admin_latched))).await?;
                return Ok(if escalated { TickOutcome::Escalated } else { TickOutcome::Waiting });
            }
        }
        self.dispatch_next_wave(order, now, admin_latched).await
    }

    async fn exhaust_order(&self, order: &Order, now: DateTime<Utc>) -> Result<TickOutcome, MatchingError> {
        match self.db.expire_order(&order.order_id).await? {
            Some(expired) => {
                info!("🔁️ Order [{}] exhausted its search window without an acceptance", expired.order_id);
                self.call_order_expired_hook(&expired).await;
                // the requesting client sees the terminal outcome
                self.publish_order_update(&expired).await;
                if let Some(group_id) = expired.group_id.clone() {
                    self.db.enqueue(NewSearchJob::group(group_id, now)).await?;
                }
                Ok(TickOutcome::Expired)
            },
            // Lost a race with an acceptance or a cancellation between the fetch and the update.
            None => Ok(TickOutcome::AlreadyTerminal),
        }
    }

    /// Fires the admin escalation for an unresolved order. The latch in the store guarantees this happens exactly
    /// once per order, no matter how many ticks observe the deadline.
    async fn escalate_order(&self, order: &Order, now: DateTime<Utc>) -> Result<bool, MatchingError> {
        let latched = self.db.latch_admin_notified(&order.order_id, now).await?;
        if latched {
            warn!("🚨️ Order [{}] is unresolved past its admin deadline. Escalating.", order.order_id);
            self.call_admin_escalation_hook(order, now).await;
            if let Err(e) =
                self.broadcaster.publish(&UserRoleId::admins(), RealtimeEvent::NewAppointmentOrders, order).await
            {
                error!("🔌️ Could not publish escalation for [{}]: {e}", order.order_id);
            }
        }
        Ok(latched)
    }

    async fn dispatch_next_wave(
        &self,
        order: Order,
        now: DateTime<Utc>,
        admin_latched: bool,
    ) -> Result<TickOutcome, MatchingError> {
        let ctx = self.build_search_context(&order, now).await?;
        let filter = candidate_filter(&order, &ctx);
        let candidates = self.db.find_candidates(filter).await?;
        // A zero-candidate wave still consumes a repeat.
        let advanced = order.time_frame().advance(now);
        let wave = order.current_wave + 1;
        let order = self.db.open_wave(&order.order_id, now, &advanced).await?;
        let invited = if candidates.is_empty() {
            debug!("🔁️ Wave {wave} of [{}] found no candidates; the search runs down toward escalation", order.order_id);
            0
        } else {
            let expires_at = now + order.repeat_interval.duration();
            let notifier = DispatchNotifier::new(&self.transport, self.policy.max_delivery_attempts);
            let report = notifier.dispatch_wave(&order, wave, &candidates, expires_at).await;
            self.db.record_invites(&order.order_id, wave, &report.invited, now).await?;
            for failed in &report.failed {
                // Bounded retries are spent. The candidate is treated as ignored; the wave itself never fails.
                self.db.record_outcome(&order.order_id, *failed, CandidateOutcome::Ignored, wave).await?;
            }
            info!(
                "🔁️ Wave {wave} of [{}]: {} invited, {} undeliverable",
                order.order_id,
                report.invited.len(),
                report.failed.len()
            );
            report.invited.len()
        };
        self.publish_order_update(&order).await;
        self.db.enqueue(NewSearchJob::order(order.order_id.clone(), advanced.next_tick_at(admin_latched))).await?;
        Ok(TickOutcome::WaveDispatched { wave, invited })
    }

    async fn build_search_context(&self, order: &Order, now: DateTime<Utc>) -> Result<SearchContext, MatchingError> {
        let company_has_interpreters = self.db.company_has_interpreters(&order.company_id).await?;
        let frame = order.time_frame();
        let base = OrderContext {
            order: order.clone(),
            is_first_search_completed: order.current_wave >= 1,
            is_second_search_completed: order.current_wave >= 2,
            is_search_needed: !order.is_terminal(),
            send_notifications: true,
            set_red_flags: frame.admin_due(now) && !order.admin_notified(),
            company_has_interpreters,
            time_to_restart: frame.next_repeat_at,
        };
        Ok(match order.group_id.as_ref() {
            Some(group_id) => {
                let group = self
                    .db
                    .fetch_group(group_id)
                    .await?
                    .ok_or_else(|| MatchingError::GroupNotFound(group_id.clone()))?;
                SearchContext::Group(GroupContext { base, group })
            },
            None => SearchContext::Order(base),
        })
    }

    /// The group bookkeeping pass: once every member has closed without an assignment, the group is rejected and
    /// the client is told.
    async fn group_tick(&self, group_id: &GroupId, _now: DateTime<Utc>) -> Result<TickOutcome, MatchingError> {
        let Some(group) = self.db.fetch_group(group_id).await? else {
            warn!("🔁️ Tick for unknown group {group_id}; dropping the job");
            return Ok(TickOutcome::Missing);
        };
        if group.is_resolved() || group.is_rejected {
            return Ok(TickOutcome::AlreadyTerminal);
        }
        match self.db.reject_group_if_dead(group_id).await? {
            Some(rejected) => {
                info!("🔁️ Group {group_id} is rejected: every member closed without an assignment");
                let members = self.db.fetch_group_members(group_id).await?;
                self.publish_group_update(&GroupSnapshot::new(rejected, members)).await;
                Ok(TickOutcome::GroupEvaluated { rejected: true })
            },
            None => Ok(TickOutcome::GroupEvaluated { rejected: false }),
        }
    }
}
