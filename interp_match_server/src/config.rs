use std::{env, str::FromStr, time::Duration};

use chrono::Duration as ChronoDuration;
use ims_common::{parse_boolean_flag, Secret};
use interp_match_engine::{db_types::RepeatInterval, MatchingPolicy, SearchPolicy};
use log::*;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/ims_store.db";
const DEFAULT_WORKER_COUNT: usize = 4;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_JOB_BATCH_SIZE: i64 = 10;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    /// Number of queue workers. Each worker runs one tick at a time; per-order locks serialize the rest.
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub job_batch_size: i64,
    /// When true, schema migrations run on startup.
    pub migrate_on_startup: bool,
    /// Buffer size of the event hook channels.
    pub event_buffer_size: usize,
    /// Search cadence and deadlines per scheduling type.
    pub matching: MatchingPolicy,
    /// Where escalation alerts are handed over. The value is never logged.
    pub admin_alert_webhook: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            worker_count: DEFAULT_WORKER_COUNT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            job_batch_size: DEFAULT_JOB_BATCH_SIZE,
            migrate_on_startup: true,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            matching: MatchingPolicy::default(),
            admin_alert_webhook: Secret::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let mut config = ServerConfig::default();
        if let Ok(url) = env::var("IMS_DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(count) = env_parsed::<usize>("IMS_WORKER_COUNT") {
            config.worker_count = count.max(1);
        }
        if let Some(millis) = env_parsed::<u64>("IMS_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(millis.max(10));
        }
        if let Some(batch) = env_parsed::<i64>("IMS_JOB_BATCH_SIZE") {
            config.job_batch_size = batch.max(1);
        }
        config.migrate_on_startup = parse_boolean_flag(env::var("IMS_MIGRATE_ON_STARTUP").ok(), true);
        if let Some(size) = env_parsed::<usize>("IMS_EVENT_BUFFER_SIZE") {
            config.event_buffer_size = size.max(1);
        }
        apply_policy_overrides("IMS_ON_DEMAND", &mut config.matching.on_demand);
        apply_policy_overrides("IMS_PRE_BOOKED", &mut config.matching.pre_booked);
        if let Some(attempts) = env_parsed::<u32>("IMS_MAX_DELIVERY_ATTEMPTS") {
            config.matching.max_delivery_attempts = attempts.max(1);
        }
        if let Ok(webhook) = env::var("IMS_ADMIN_ALERT_WEBHOOK") {
            config.admin_alert_webhook = Secret::new(webhook);
        }
        config
    }
}

/// Overlays `{prefix}_REPEAT_INTERVAL`, `{prefix}_MAX_REPEATS`, `{prefix}_ADMIN_DEADLINE_MINS` and
/// `{prefix}_SEARCH_WINDOW_MINS` onto the given policy.
fn apply_policy_overrides(prefix: &str, policy: &mut SearchPolicy) {
    if let Some(interval) = env_parsed::<RepeatInterval>(&format!("{prefix}_REPEAT_INTERVAL")) {
        policy.repeat_interval = interval;
    }
    if let Some(repeats) = env_parsed::<u32>(&format!("{prefix}_MAX_REPEATS")) {
        policy.max_repeats = repeats;
    }
    if let Some(mins) = env_parsed::<i64>(&format!("{prefix}_ADMIN_DEADLINE_MINS")) {
        policy.notify_admin_after = ChronoDuration::minutes(mins.max(1));
    }
    if let Some(mins) = env_parsed::<i64>(&format!("{prefix}_SEARCH_WINDOW_MINS")) {
        policy.search_window = ChronoDuration::minutes(mins.max(1));
    }
}

fn env_parsed<T: FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring {name}: could not parse {value:?}");
            None
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.worker_count, 4);
        assert!(config.migrate_on_startup);
        assert_eq!(config.matching.on_demand.max_repeats, 5);
        assert_eq!(config.matching.pre_booked.repeat_interval, RepeatInterval::FifteenMinutes);
        // secrets never leak through Debug
        assert_eq!(format!("{:?}", config.admin_alert_webhook), "****");
    }

    #[test]
    fn policy_overrides_apply_and_reject_garbage() {
        let mut policy = MatchingPolicy::default().on_demand;
        env::set_var("IMS_TEST_POLICY_MAX_REPEATS", "9");
        env::set_var("IMS_TEST_POLICY_REPEAT_INTERVAL", "FiveMinutes");
        env::set_var("IMS_TEST_POLICY_ADMIN_DEADLINE_MINS", "not-a-number");
        apply_policy_overrides("IMS_TEST_POLICY", &mut policy);
        assert_eq!(policy.max_repeats, 9);
        assert_eq!(policy.repeat_interval, RepeatInterval::FiveMinutes);
        assert_eq!(policy.notify_admin_after, ChronoDuration::minutes(6));
        env::remove_var("IMS_TEST_POLICY_MAX_REPEATS");
        env::remove_var("IMS_TEST_POLICY_REPEAT_INTERVAL");
        env::remove_var("IMS_TEST_POLICY_ADMIN_DEADLINE_MINS");
    }
}
