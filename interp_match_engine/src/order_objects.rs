//! Query specifications and wire-facing data objects for the matching API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{
    CommunicationType,
    GroupId,
    InterpreterId,
    Order,
    OrderGroup,
    OrderId,
    OrderStatusType,
    SchedulingType,
};

//--------------------------------------  CandidateQueryFilter -------------------------------------------------------
/// The specification for one candidate query. Filters are conjunctive; backends translate this into their own
/// storage API. An empty result set is a valid outcome, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateQueryFilter {
    pub lang_from: Option<String>,
    pub lang_to: Option<String>,
    pub topic: Option<String>,
    pub communication_type: Option<CommunicationType>,
    /// Exclude interpreters blacklisted by this client.
    pub not_blacklisted_by: Option<String>,
    /// Exclude interpreters that already declined this order. An interpreter that merely ignored a wave stays
    /// eligible for the next one.
    pub exclude_declined_for: Option<OrderId>,
    /// Restrict the search to a single company's interpreters (the first-pass scope).
    pub company_scope: Option<String>,
    pub limit: Option<i64>,
}

impl CandidateQueryFilter {
    pub fn with_language_pair<S1: Into<String>, S2: Into<String>>(mut self, from: S1, to: S2) -> Self {
        self.lang_from = Some(from.into());
        self.lang_to = Some(to.into());
        self
    }

    pub fn with_topic<S: Into<String>>(mut self, topic: S) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_communication_type(mut self, communication_type: CommunicationType) -> Self {
        self.communication_type = Some(communication_type);
        self
    }

    pub fn with_not_blacklisted_by<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.not_blacklisted_by = Some(customer_id.into());
        self
    }

    pub fn with_exclude_declined_for(mut self, order_id: OrderId) -> Self {
        self.exclude_declined_for = Some(order_id);
        self
    }

    pub fn with_company_scope<S: Into<String>>(mut self, company_id: S) -> Self {
        self.company_scope = Some(company_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

//--------------------------------------   OrderQueryFilter    -------------------------------------------------------
/// Fetches orders according to the given criteria. Used by admin queries and the test suite.
#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub appointment_id: Option<String>,
    pub customer_id: Option<String>,
    pub group_id: Option<GroupId>,
    pub scheduling_type: Option<SchedulingType>,
    pub status: Option<Vec<OrderStatusType>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.appointment_id.is_none()
            && self.customer_id.is_none()
            && self.group_id.is_none()
            && self.scheduling_type.is_none()
            && self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
            && self.since.is_none()
            && self.until.is_none()
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_appointment_id<S: Into<String>>(mut self, appointment_id: S) -> Self {
        self.appointment_id = Some(appointment_id.into());
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_group_id(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_scheduling_type(mut self, scheduling_type: SchedulingType) -> Self {
        self.scheduling_type = Some(scheduling_type);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}

//--------------------------------------    WaveInvitation     -------------------------------------------------------
/// The interpreter-facing invitation for one wave. This is what the notification transport delivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveInvitation {
    pub order_id: OrderId,
    pub appointment_id: String,
    pub interpreter_id: InterpreterId,
    pub scheduling_type: SchedulingType,
    pub communication_type: CommunicationType,
    pub topic: String,
    pub lang_from: String,
    pub lang_to: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub wave: i64,
    /// After this instant the invitation is treated as ignored.
    pub expires_at: DateTime<Utc>,
}

impl WaveInvitation {
    pub fn for_candidate(order: &Order, interpreter_id: InterpreterId, wave: i64, expires_at: DateTime<Utc>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            appointment_id: order.appointment_id.clone(),
            interpreter_id,
            scheduling_type: order.scheduling_type,
            communication_type: order.communication_type,
            topic: order.topic.clone(),
            lang_from: order.lang_from.clone(),
            lang_to: order.lang_to.clone(),
            starts_at: order.starts_at,
            ends_at: order.ends_at,
            wave,
            expires_at,
        }
    }
}

//--------------------------------------     GroupSnapshot     -------------------------------------------------------
/// A group together with its member orders, as published to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group: OrderGroup,
    pub members: Vec<Order>,
}

impl GroupSnapshot {
    pub fn new(group: OrderGroup, members: Vec<Order>) -> Self {
        Self { group, members }
    }
}

//--------------------------------------    ExceptionNotice    -------------------------------------------------------
/// A delivery or validation error surfaced to a connected client on the `exception` channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionNotice {
    pub message: String,
}

impl ExceptionNotice {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into() }
    }
}
