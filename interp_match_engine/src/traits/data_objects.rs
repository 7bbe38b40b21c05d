use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderGroup, OrderId};

/// The result of an atomic group assignment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroupAssignment {
    /// Every live member was assigned to the interpreter and the group's resolved interpreter was recorded.
    Assigned { group: OrderGroup, members: Vec<Order> },
    /// The assignment could not cover every member; nothing was persisted. The provisional acceptance must be
    /// rolled back to `Ignored` by the caller.
    Conflict { blocking_member: Option<OrderId> },
}

impl GroupAssignment {
    pub fn is_assigned(&self) -> bool {
        matches!(self, GroupAssignment::Assigned { .. })
    }
}
