//! Realtime delivery and reconnect recovery.
//!
//! Every order/group state transition is pushed to all connected sessions of the affected users, and the latest
//! payload per (user role, event type) is cached so that a client reconnecting between events can fetch the last
//! known state instead of missing it. Cache entries live until [`RealtimeBroadcaster::clear_user`] is called on
//! logout/session end; there is no TTL decay.

mod broadcaster;
mod cache;

use std::{fmt::Display, str::FromStr};

pub use broadcaster::{RealtimeBroadcaster, RealtimeError, SessionHandle, SessionRegistry};
pub use cache::EventCache;
use serde::{Deserialize, Serialize};

use crate::db_types::{ConversionError, InterpreterId};

//--------------------------------------      UserRoleId       -------------------------------------------------------
/// Identifies one user in one role, the unit realtime subscriptions and the event cache are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRoleId(pub String);

impl UserRoleId {
    pub fn client<S: Into<String>>(customer_id: S) -> Self {
        Self(format!("client:{}", customer_id.into()))
    }

    pub fn interpreter(id: InterpreterId) -> Self {
        Self(format!("interpreter:{}", id.value()))
    }

    /// The shared feed for administrators watching the order queue.
    pub fn admins() -> Self {
        Self("admins".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserRoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------     RealtimeEvent     -------------------------------------------------------
/// The realtime event types published by the matching core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealtimeEvent {
    /// An order was created or updated.
    NewAppointmentOrders,
    /// An order group was created or updated.
    NewAppointmentOrderGroups,
    /// Session/assignment state for a running appointment.
    LiveSessions,
    /// A delivery or validation error surfaced to a connected client.
    Exception,
}

impl RealtimeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeEvent::NewAppointmentOrders => "new-appointment-orders",
            RealtimeEvent::NewAppointmentOrderGroups => "new-appointment-orders-groups",
            RealtimeEvent::LiveSessions => "live-sessions",
            RealtimeEvent::Exception => "exception",
        }
    }
}

impl Display for RealtimeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RealtimeEvent {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new-appointment-orders" => Ok(Self::NewAppointmentOrders),
            "new-appointment-orders-groups" => Ok(Self::NewAppointmentOrderGroups),
            "live-sessions" => Ok(Self::LiveSessions),
            "exception" => Ok(Self::Exception),
            s => Err(ConversionError(format!("Invalid realtime event type: {s}"))),
        }
    }
}
