use std::sync::Arc;

use interp_match_engine::{
    db_types::InterpreterId,
    order_objects::WaveInvitation,
    traits::{DispatchError, InviteTransport},
};
use tokio::sync::Mutex;

/// Captures every invitation instead of delivering it. `refusing()` builds a transport whose deliveries always
/// fail, for exercising the bounded-retry path.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<WaveInvitation>>>,
    refuse: bool,
}

impl RecordingTransport {
    pub fn refusing() -> Self {
        Self { sent: Arc::default(), refuse: true }
    }

    pub async fn invites(&self) -> Vec<WaveInvitation> {
        self.sent.lock().await.clone()
    }

    pub async fn invited_for_wave(&self, wave: i64) -> Vec<InterpreterId> {
        self.sent.lock().await.iter().filter(|i| i.wave == wave).map(|i| i.interpreter_id).collect()
    }
}

impl InviteTransport for RecordingTransport {
    async fn send_invite(&self, invite: &WaveInvitation) -> Result<(), DispatchError> {
        if self.refuse {
            return Err(DispatchError::DeliveryFailure("push gateway unavailable".to_string()));
        }
        self.sent.lock().await.push(invite.clone());
        Ok(())
    }
}
