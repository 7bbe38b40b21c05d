use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use log::*;

use crate::{
    db_types::{InterpreterCandidate, InterpreterId, Order},
    order_objects::WaveInvitation,
    traits::InviteTransport,
};

/// Per-wave delivery results. `failed` candidates spent their retry budget and must be recorded as `Ignored`.
#[derive(Debug, Clone, Default)]
pub struct WaveReport {
    pub invited: Vec<InterpreterId>,
    pub failed: Vec<InterpreterId>,
}

/// Sends the invitations for one wave through the notification transport.
///
/// Deliveries run concurrently and each candidate gets a bounded number of attempts. A candidate whose delivery
/// keeps failing is written off as ignored; an individual transport failure is never fatal to the wave.
pub struct DispatchNotifier<'a, T> {
    transport: &'a T,
    max_attempts: u32,
}

impl<'a, T> DispatchNotifier<'a, T>
where T: InviteTransport
{
    pub fn new(transport: &'a T, max_attempts: u32) -> Self {
        Self { transport, max_attempts: max_attempts.max(1) }
    }

    pub async fn dispatch_wave(
        &self,
        order: &Order,
        wave: i64,
        candidates: &[InterpreterCandidate],
        expires_at: DateTime<Utc>,
    ) -> WaveReport {
        let deliveries = candidates.iter().map(|c| self.deliver(order, c.id, wave, expires_at));
        let delivered = join_all(deliveries).await;
        let mut report = WaveReport::default();
        for (candidate, ok) in candidates.iter().zip(delivered) {
            if ok {
                report.invited.push(candidate.id);
            } else {
                report.failed.push(candidate.id);
            }
        }
        report
    }

    async fn deliver(
        &self,
        order: &Order,
        interpreter: InterpreterId,
        wave: i64,
        expires_at: DateTime<Utc>,
    ) -> bool {
        let invite = WaveInvitation::for_candidate(order, interpreter, wave, expires_at);
        for attempt in 1..=self.max_attempts {
            match self.transport.send_invite(&invite).await {
                Ok(()) => {
                    trace!("📨️ Invitation for [{}] delivered to {interpreter}", order.order_id);
                    return true;
                },
                Err(e) => {
                    warn!("📨️ Delivery attempt {attempt}/{} to {interpreter} failed: {e}", self.max_attempts);
                },
            }
        }
        error!(
            "📨️ Gave up inviting {interpreter} to [{}]. The candidate will be treated as ignored.",
            order.order_id
        );
        false
    }
}
