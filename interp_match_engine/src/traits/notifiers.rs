use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{db_types::OrderId, order_objects::WaveInvitation};

/// Delivers wave invitations to interpreters. Implementations wrap the push-notification and in-app realtime
/// channels; the engine never talks to APNs/FCM/SMS directly.
#[allow(async_fn_in_trait)]
pub trait InviteTransport {
    async fn send_invite(&self, invite: &WaveInvitation) -> Result<(), DispatchError>;
}

/// Delivers escalation warnings to administrators. Wired to the `on_admin_escalation` hook by the composition root.
#[allow(async_fn_in_trait)]
pub trait AdminAlert {
    async fn send_admin_alert(&self, alert: &AdminAlertMessage) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAlertMessage {
    pub order_id: OrderId,
    pub appointment_id: String,
    /// When the search will give up if nobody intervenes.
    pub end_search_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Invitation could not be delivered: {0}")]
    DeliveryFailure(String),
    #[error("Alert could not be delivered: {0}")]
    AlertFailure(String),
}
