#![allow(dead_code)]

pub mod prepare_env;
pub mod transports;

use chrono::Duration;
use interp_match_engine::{
    db_types::RepeatInterval,
    events::EventProducers,
    realtime::{EventCache, RealtimeBroadcaster, SessionRegistry},
    MatchFlowApi,
    MatchingPolicy,
    SearchPolicy,
    SqliteDatabase,
};
use log::error;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::support::{
    prepare_env::{prepare_test_env, random_db_path},
    transports::RecordingTransport,
};

pub type TestApi = MatchFlowApi<SqliteDatabase, RecordingTransport>;

/// A tight policy so scenario tests can walk the whole life cycle with synthetic clocks: two five-minute waves,
/// an admin warning far out of the way, and a twelve-minute window.
pub fn test_policy() -> MatchingPolicy {
    MatchingPolicy {
        on_demand: SearchPolicy {
            repeat_interval: RepeatInterval::FiveMinutes,
            max_repeats: 2,
            notify_admin_after: Duration::minutes(60),
            search_window: Duration::minutes(12),
        },
        pre_booked: MatchingPolicy::default().pre_booked,
        max_delivery_attempts: 2,
    }
}

pub async fn setup_api() -> (TestApi, RecordingTransport) {
    setup_api_with(test_policy()).await
}

pub async fn setup_api_with(policy: MatchingPolicy) -> (TestApi, RecordingTransport) {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    let transport = RecordingTransport::default();
    let broadcaster = RealtimeBroadcaster::new(SessionRegistry::new(), EventCache::new());
    let api = MatchFlowApi::new(db, transport.clone(), broadcaster, EventProducers::default()).with_policy(policy);
    (api, transport)
}

pub async fn tear_down(mut api: TestApi) {
    use interp_match_engine::traits::MatchingDatabase;
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.ok();
}
