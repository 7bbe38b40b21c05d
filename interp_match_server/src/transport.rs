use interp_match_engine::{
    order_objects::WaveInvitation,
    realtime::{RealtimeBroadcaster, RealtimeEvent, UserRoleId},
    traits::{DispatchError, InviteTransport},
};
use log::trace;

/// Delivers wave invitations as in-app realtime events to connected interpreter sessions.
///
/// Mobile push fan-out (APNs/FCM/SMS) is performed by the external notification service against the same
/// invitation payload; this transport covers interpreters with a live connection, and keeps the invitation in the
/// event cache for those who reconnect mid-wave.
#[derive(Clone)]
pub struct RealtimeInviteTransport {
    broadcaster: RealtimeBroadcaster,
}

impl RealtimeInviteTransport {
    pub fn new(broadcaster: RealtimeBroadcaster) -> Self {
        Self { broadcaster }
    }
}

impl InviteTransport for RealtimeInviteTransport {
    async fn send_invite(&self, invite: &WaveInvitation) -> Result<(), DispatchError> {
        let role = UserRoleId::interpreter(invite.interpreter_id);
        trace!("📨️ Pushing wave {} invitation for [{}] to {role}", invite.wave, invite.order_id);
        self.broadcaster
            .publish(&role, RealtimeEvent::NewAppointmentOrders, invite)
            .await
            .map_err(|e| DispatchError::DeliveryFailure(e.to_string()))
    }
}
