use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderGroup};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAssignedEvent {
    pub order: Order,
}

impl OrderAssignedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExpiredEvent {
    pub order: Order,
}

impl OrderExpiredEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
}

impl OrderCancelledEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResolvedEvent {
    pub group: OrderGroup,
    pub members: Vec<Order>,
}

impl GroupResolvedEvent {
    pub fn new(group: OrderGroup, members: Vec<Order>) -> Self {
        Self { group, members }
    }
}

/// Fired exactly once per order, when the admin warning deadline passes with the search unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminEscalationEvent {
    pub order: Order,
    pub escalated_at: DateTime<Utc>,
}

impl AdminEscalationEvent {
    pub fn new(order: Order, escalated_at: DateTime<Utc>) -> Self {
        Self { order, escalated_at }
    }
}
