//! Realtime delivery and reconnect recovery: the latest event per (user, type) survives missed pushes.

use std::str::FromStr;

use interp_match_engine::{
    db_types::{NewOrder, OrderId},
    realtime::{EventCache, RealtimeBroadcaster, RealtimeEvent, SessionRegistry, UserRoleId},
};
use serde_json::json;
use tokio::sync::mpsc;

mod support;

#[tokio::test]
async fn a_reconnecting_client_sees_the_latest_cached_event() {
    let broadcaster = RealtimeBroadcaster::new(SessionRegistry::new(), EventCache::new());
    let role = UserRoleId::client("alice");
    let (tx, mut rx) = mpsc::channel(8);
    broadcaster.registry().register(&role, tx).await;

    for wave in 1..=3 {
        broadcaster
            .publish(&role, RealtimeEvent::NewAppointmentOrders, &json!({ "order": "order-4001", "wave": wave }))
            .await
            .unwrap();
    }

    // the connected session saw all three pushes
    let mut delivered = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        delivered.push(msg);
    }
    assert_eq!(delivered.len(), 3);

    // a client reconnecting after the fact still recovers the newest state
    let latest = broadcaster.latest(&role, RealtimeEvent::NewAppointmentOrders).await.unwrap();
    assert!(latest.contains("\"wave\":3"));
    assert_eq!(broadcaster.latest(&role, RealtimeEvent::LiveSessions).await, None);
}

#[tokio::test]
async fn clear_user_removes_sessions_and_cached_entries() {
    let broadcaster = RealtimeBroadcaster::new(SessionRegistry::new(), EventCache::new());
    let alice = UserRoleId::client("alice");
    let bob = UserRoleId::client("bob");
    let (tx, _rx) = mpsc::channel(8);
    broadcaster.registry().register(&alice, tx).await;
    broadcaster.publish(&alice, RealtimeEvent::NewAppointmentOrders, &json!({ "n": 1 })).await.unwrap();
    broadcaster.publish(&alice, RealtimeEvent::LiveSessions, &json!({ "n": 2 })).await.unwrap();
    broadcaster.publish(&bob, RealtimeEvent::NewAppointmentOrders, &json!({ "n": 3 })).await.unwrap();

    broadcaster.clear_user(&alice).await;
    assert_eq!(broadcaster.latest(&alice, RealtimeEvent::NewAppointmentOrders).await, None);
    assert_eq!(broadcaster.registry().connection_count().await, 0);
    // other users are untouched
    assert!(broadcaster.latest(&bob, RealtimeEvent::NewAppointmentOrders).await.is_some());
}

#[tokio::test]
async fn a_dead_session_surfaces_on_the_exception_channel() {
    let broadcaster = RealtimeBroadcaster::new(SessionRegistry::new(), EventCache::new());
    let role = UserRoleId::client("carol");
    let (tx, rx) = mpsc::channel(1);
    broadcaster.registry().register(&role, tx).await;
    drop(rx);

    broadcaster.publish(&role, RealtimeEvent::NewAppointmentOrders, &json!({ "n": 1 })).await.unwrap();
    // the payload is still cached for reconnect recovery, and the failure shows up as an exception
    assert!(broadcaster.latest(&role, RealtimeEvent::NewAppointmentOrders).await.is_some());
    let exception = broadcaster.latest(&role, RealtimeEvent::Exception).await.unwrap();
    assert!(exception.contains("missed"));
}

#[tokio::test]
async fn order_creation_lands_in_the_client_and_admin_caches() {
    let (api, _transport) = support::setup_api().await;
    let order_id = OrderId::from_str("order-4002").unwrap();
    let order = NewOrder::new(order_id.clone(), "apt-41", "erin", "en", "es");
    api.process_new_order(order).await.unwrap();

    let client = broadcast_latest(&api, &UserRoleId::client("erin")).await;
    assert!(client.contains("order-4002"));
    let admins = broadcast_latest(&api, &UserRoleId::admins()).await;
    assert!(admins.contains("order-4002"));
    support::tear_down(api).await;
}

async fn broadcast_latest(api: &support::TestApi, role: &UserRoleId) -> String {
    api.broadcaster().latest(role, RealtimeEvent::NewAppointmentOrders).await.expect("expected a cached event")
}
