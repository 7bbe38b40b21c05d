use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{
        CandidateOutcome,
        InterpreterId,
        NewOrder,
        NewOrderGroup,
        Order,
        OrderGroup,
        OrderId,
    },
    events::{
        AdminEscalationEvent,
        EventProducers,
        GroupResolvedEvent,
        OrderAssignedEvent,
        OrderCancelledEvent,
        OrderExpiredEvent,
    },
    matcher::{errors::MatchingError, group::GroupCoordinator},
    order_objects::{GroupSnapshot, OrderQueryFilter},
    realtime::{RealtimeBroadcaster, RealtimeEvent, UserRoleId},
    timeframe::{MatchingPolicy, TimeFrame},
    traits::{
        CandidateDirectory,
        GroupAssignment,
        InviteTransport,
        JobQueue,
        MatchingDatabase,
        NewSearchJob,
    },
    workers::OrderLocks,
};

/// `MatchFlowApi` is the primary API for opening searches, running search ticks and arbitrating acceptances in
/// response to booking events and interpreter responses.
pub struct MatchFlowApi<B, T> {
    pub(crate) db: B,
    pub(crate) transport: T,
    pub(crate) broadcaster: RealtimeBroadcaster,
    producers: EventProducers,
    pub(crate) policy: MatchingPolicy,
    pub(crate) locks: OrderLocks,
}

impl<B, T> Debug for MatchFlowApi<B, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchFlowApi")
    }
}

impl<B, T> MatchFlowApi<B, T> {
    pub fn new(db: B, transport: T, broadcaster: RealtimeBroadcaster, producers: EventProducers) -> Self {
        Self {
            db,
            transport,
            broadcaster,
            producers,
            policy: MatchingPolicy::default(),
            locks: OrderLocks::new(),
        }
    }

    pub fn with_policy(mut self, policy: MatchingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn policy(&self) -> &MatchingPolicy {
        &self.policy
    }

    pub fn broadcaster(&self) -> &RealtimeBroadcaster {
        &self.broadcaster
    }
}

impl<B, T> MatchFlowApi<B, T>
where
    B: MatchingDatabase + CandidateDirectory + JobQueue,
    T: InviteTransport,
{
    /// Submit a new order to the engine.
    ///
    /// This call is idempotent: re-submitting an existing order returns the stored record and opens nothing. For a
    /// fresh order the initial time frame is computed from the matching policy, the creation is pushed to the
    /// requesting client and the admin queue, and the first search wave is queued to run immediately.
    pub async fn process_new_order(&self, order: NewOrder) -> Result<(Order, bool), MatchingError> {
        let now = Utc::now();
        let frame = TimeFrame::initial(order.scheduling_type, &self.policy, now);
        let (order, inserted) = self.db.insert_order(order, &frame).await?;
        if !inserted {
            debug!("🔄️📦️ Order [{}] already exists. Nothing to open.", order.order_id);
            return Ok((order, false));
        }
        self.publish_order_update(&order).await;
        self.db.enqueue(NewSearchJob::order(order.order_id.clone(), now)).await?;
        debug!("🔄️📦️ Order [{}] accepted; first search wave queued", order.order_id);
        Ok((order, true))
    }

    /// Submit a multi-segment booking as one group. Members are stamped with the group id and every member opens
    /// its own search; when `same_interpreter` is set the group coordinator gates all acceptances.
    pub async fn process_new_group(
        &self,
        group: NewOrderGroup,
        members: Vec<NewOrder>,
    ) -> Result<(OrderGroup, Vec<Order>), MatchingError> {
        let now = Utc::now();
        let members = members
            .into_iter()
            .map(|m| {
                let frame = TimeFrame::initial(m.scheduling_type, &self.policy, now);
                (m.in_group(group.group_id.clone()), frame)
            })
            .collect::<Vec<_>>();
        let (group, members) = self.db.insert_group(group, members).await?;
        debug!("🔄️📦️ Group {} opened with {} member order(s)", group.group_id, members.len());
        self.publish_group_update(&GroupSnapshot::new(group.clone(), members.clone())).await;
        for member in &members {
            self.db.enqueue(NewSearchJob::order(member.order_id.clone(), now)).await?;
        }
        Ok((group, members))
    }

    /// An interpreter accepts an order.
    ///
    /// First accepted wins: the transition is arbitrated by a compare-and-set on the order status, and the
    /// interpreter's own availability is the final check. A late acceptance (after assignment, expiry,
    /// cancellation or a group member conflict) is answered with [`MatchingError::AcceptanceConflict`]
    /// ("no longer available"), which is reported to that candidate only.
    ///
    /// For a `same_interpreter` group the acceptance is provisional until the group coordinator verifies the
    /// interpreter can cover every member; all member orders then transition atomically.
    ///
    /// Returns every order assigned by this acceptance (one, or the whole group).
    pub async fn accept_order(
        &self,
        order_id: &OrderId,
        interpreter: InterpreterId,
    ) -> Result<Vec<Order>, MatchingError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| MatchingError::OrderNotFound(order_id.clone()))?;
        if order.is_terminal() {
            debug!("🏁️ {interpreter} accepted [{order_id}] after it became {}. Conflict.", order.status);
            return Err(MatchingError::AcceptanceConflict(order_id.clone()));
        }
        if !self.db.is_available(interpreter, order.starts_at, order.ends_at).await? {
            debug!("🏁️ {interpreter} has an overlapping assignment for [{order_id}]'s window. Conflict.");
            return Err(MatchingError::AcceptanceConflict(order_id.clone()));
        }
        if let Some(group_id) = order.group_id.clone() {
            let group =
                self.db.fetch_group(&group_id).await?.ok_or_else(|| MatchingError::GroupNotFound(group_id.clone()))?;
            if group.same_interpreter {
                return self.accept_group_member(group, order, interpreter).await;
            }
        }
        match self.db.try_assign_order(order_id, interpreter).await? {
            Some(assigned) => {
                info!("🏁️ Order [{order_id}] assigned to {interpreter}");
                self.call_order_assigned_hook(std::slice::from_ref(&assigned)).await;
                self.publish_order_update(&assigned).await;
                self.publish_live_session(&assigned).await;
                Ok(vec![assigned])
            },
            None => {
                debug!("🏁️ {interpreter} lost the acceptance race for [{order_id}]");
                Err(MatchingError::AcceptanceConflict(order_id.clone()))
            },
        }
    }

    async fn accept_group_member(
        &self,
        group: OrderGroup,
        member: Order,
        interpreter: InterpreterId,
    ) -> Result<Vec<Order>, MatchingError> {
        let coordinator = GroupCoordinator::new(self.db.clone());
        match coordinator.resolve(&group, interpreter, &member).await? {
            GroupAssignment::Assigned { group, members } => {
                info!(
                    "🏁️ Group {} resolved to {interpreter} across {} member order(s)",
                    group.group_id,
                    members.len()
                );
                self.call_group_resolved_hook(&group, &members).await;
                self.call_order_assigned_hook(&members).await;
                self.publish_group_update(&GroupSnapshot::new(group, members.clone())).await;
                for m in &members {
                    self.publish_order_update(m).await;
                    self.publish_live_session(m).await;
                }
                Ok(members)
            },
            GroupAssignment::Conflict { blocking_member } => {
                // The provisional acceptance rolls back to Ignored for this member; the search continues.
                self.db
                    .record_outcome(&member.order_id, interpreter, CandidateOutcome::Ignored, member.current_wave)
                    .await?;
                match blocking_member {
                    Some(blocked) => debug!(
                        "🏁️ {interpreter} cannot take group {}: member [{blocked}] is in the way. Rolled back.",
                        group.group_id
                    ),
                    None => debug!("🏁️ Group {} is no longer open to {interpreter}. Rolled back.", group.group_id),
                }
                Err(MatchingError::AcceptanceConflict(member.order_id.clone()))
            },
        }
    }

    /// An interpreter explicitly rejects an order. Recorded immediately, without waiting out the wave timer, and
    /// the interpreter is never offered this order again.
    pub async fn decline_order(&self, order_id: &OrderId, interpreter: InterpreterId) -> Result<(), MatchingError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| MatchingError::OrderNotFound(order_id.clone()))?;
        if order.is_terminal() {
            debug!("🏁️ Decline from {interpreter} for [{order_id}] arrived after the search closed. No effect.");
            return Ok(());
        }
        self.db.record_outcome(order_id, interpreter, CandidateOutcome::Declined, order.current_wave).await?;
        debug!("🏁️ {interpreter} declined [{order_id}]; excluded from every later wave");
        Ok(())
    }

    /// The underlying appointment was cancelled externally. Only a searching order can be cancelled; in-flight
    /// invitations are not retracted from the transport, but any acceptance that follows is rejected by the
    /// compare-and-set guard.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, MatchingError> {
        match self.db.cancel_order(order_id).await? {
            Some(order) => {
                info!("🔄️❌️ Order [{order_id}] cancelled; open invitations are now void");
                self.call_order_cancelled_hook(&order).await;
                self.publish_order_update(&order).await;
                if let Some(group_id) = order.group_id.clone() {
                    self.db.enqueue(NewSearchJob::group(group_id, Utc::now())).await?;
                }
                Ok(order)
            },
            None => match self.db.fetch_order(order_id).await? {
                Some(order) => Err(MatchingError::OrderAlreadyTerminal(order.order_id)),
                None => Err(MatchingError::OrderNotFound(order_id.clone())),
            },
        }
    }

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`.
    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MatchingError> {
        Ok(self.db.search_orders(query).await?)
    }

    //------------------------------------     hook plumbing      ----------------------------------------------------

    pub(crate) async fn call_order_assigned_hook(&self, orders: &[Order]) {
        for emitter in &self.producers.order_assigned_producer {
            trace!("🔄️📦️ Notifying order assigned hook subscribers");
            for order in orders {
                emitter.publish_event(OrderAssignedEvent::new(order.clone())).await;
            }
        }
    }

    pub(crate) async fn call_order_expired_hook(&self, order: &Order) {
        for emitter in &self.producers.order_expired_producer {
            emitter.publish_event(OrderExpiredEvent::new(order.clone())).await;
        }
    }

    pub(crate) async fn call_order_cancelled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_cancelled_producer {
            emitter.publish_event(OrderCancelledEvent::new(order.clone())).await;
        }
    }

    pub(crate) async fn call_group_resolved_hook(&self, group: &OrderGroup, members: &[Order]) {
        for emitter in &self.producers.group_resolved_producer {
            emitter.publish_event(GroupResolvedEvent::new(group.clone(), members.to_vec())).await;
        }
    }

    pub(crate) async fn call_admin_escalation_hook(&self, order: &Order, escalated_at: DateTime<Utc>) {
        for emitter in &self.producers.admin_escalation_producer {
            emitter.publish_event(AdminEscalationEvent::new(order.clone(), escalated_at)).await;
        }
    }

    //------------------------------------   realtime plumbing    ----------------------------------------------------

    /// Pushes the order's current state to everyone affected: the requesting client, the admin queue, and the
    /// assigned interpreter once there is one.
    pub(crate) async fn publish_order_update(&self, order: &Order) {
        let mut roles = vec![UserRoleId::client(order.customer_id.as_str()), UserRoleId::admins()];
        if let Some(interpreter) = order.assigned_interpreter {
            roles.push(UserRoleId::interpreter(interpreter));
        }
        for role in roles {
            if let Err(e) = self.broadcaster.publish(&role, RealtimeEvent::NewAppointmentOrders, order).await {
                error!("🔌️ Could not publish order update for [{}] to {role}: {e}", order.order_id);
            }
        }
    }

    pub(crate) async fn publish_live_session(&self, order: &Order) {
        let mut roles = vec![UserRoleId::client(order.customer_id.as_str())];
        if let Some(interpreter) = order.assigned_interpreter {
            roles.push(UserRoleId::interpreter(interpreter));
        }
        for role in roles {
            if let Err(e) = self.broadcaster.publish(&role, RealtimeEvent::LiveSessions, order).await {
                error!("🔌️ Could not publish session state for [{}] to {role}: {e}", order.order_id);
            }
        }
    }

    pub(crate) async fn publish_group_update(&self, snapshot: &GroupSnapshot) {
        let mut roles = vec![UserRoleId::admins()];
        if let Some(first) = snapshot.members.first() {
            roles.push(UserRoleId::client(first.customer_id.as_str()));
        }
        if let Some(interpreter) = snapshot.group.resolved_interpreter {
            roles.push(UserRoleId::interpreter(interpreter));
        }
        for role in roles {
            if let Err(e) =
                self.broadcaster.publish(&role, RealtimeEvent::NewAppointmentOrderGroups, snapshot).await
            {
                error!("🔌️ Could not publish group update for {} to {role}: {e}", snapshot.group.group_id);
            }
        }
    }
}
