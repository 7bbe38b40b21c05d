use std::sync::Arc;

use interp_match_engine::{
    events::{EventHandlers, EventHooks},
    realtime::{EventCache, RealtimeBroadcaster, SessionRegistry},
    traits::{AdminAlert, AdminAlertMessage},
    workers::WorkerOptions,
    MatchFlowApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    alerts::LogAdminAlert,
    config::ServerConfig,
    errors::ServerError,
    search_workers::start_search_workers,
    transport::RealtimeInviteTransport,
};

/// Composes the engine and runs it until a shutdown signal arrives.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not open {}: {e}", config.database_url)))?;
    if config.migrate_on_startup {
        db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed: {e}")))?;
        info!("🚀️ Database schema is up to date");
    }

    let broadcaster = RealtimeBroadcaster::new(SessionRegistry::new(), EventCache::new());
    let handlers = EventHandlers::new(config.event_buffer_size, build_hooks(&config));
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let transport = RealtimeInviteTransport::new(broadcaster.clone());
    let api = Arc::new(
        MatchFlowApi::new(db, transport, broadcaster, producers).with_policy(config.matching),
    );
    let workers = start_search_workers(api, WorkerOptions {
        count: config.worker_count,
        poll_interval: config.poll_interval,
        batch_size: config.job_batch_size,
        ..WorkerOptions::default()
    });
    info!("🚀️ Matching engine running with {} worker(s)", config.worker_count);

    tokio::signal::ctrl_c().await?;
    info!("🚀️ Shutdown signal received");
    for handle in workers {
        handle.abort();
    }
    Ok(())
}

fn build_hooks(config: &ServerConfig) -> EventHooks {
    let mut hooks = EventHooks::default();
    let alert = LogAdminAlert::new(config.admin_alert_webhook.clone());
    hooks.on_admin_escalation(move |event| {
        let alert = alert.clone();
        Box::pin(async move {
            let message = AdminAlertMessage {
                order_id: event.order.order_id.clone(),
                appointment_id: event.order.appointment_id.clone(),
                end_search_at: event.order.end_search_at,
                message: format!("Unresolved since {}, wave {}", event.order.created_at, event.order.current_wave),
            };
            if let Err(e) = alert.send_admin_alert(&message).await {
                error!("🚨️ Could not deliver admin alert for [{}]: {e}", event.order.order_id);
            }
        })
    });
    hooks.on_order_assigned(|event| {
        Box::pin(async move {
            info!("🪝️ Order [{}] assigned to {:?}", event.order.order_id, event.order.assigned_interpreter);
        })
    });
    hooks.on_order_expired(|event| {
        Box::pin(async move {
            info!("🪝️ Order [{}] went unanswered and expired", event.order.order_id);
        })
    });
    hooks
}
