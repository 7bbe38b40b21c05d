//! Wave scheduling scenarios: repeat consumption, ignore/decline bookkeeping, exhaustion and escalation.

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
};

use chrono::Duration;
use ims_common::Rating;
use interp_match_engine::{
    db_types::{CandidateOutcome, NewInterpreter, NewOrder, OrderId, OrderStatusType, RepeatInterval},
    events::{EventHandlers, EventHooks},
    realtime::{EventCache, RealtimeBroadcaster, SessionRegistry},
    traits::{JobTarget, MatchingDatabase},
    MatchFlowApi,
    MatchingPolicy,
    SearchPolicy,
    TickOutcome,
};
use log::info;

mod support;

use support::{prepare_env, transports::RecordingTransport};

#[tokio::test]
async fn two_waves_ignore_then_decline_exhausts_without_a_third_wave() {
    let (api, transport) = support::setup_api().await;
    let terp = api
        .db()
        .register_interpreter(NewInterpreter::new("Mira Kovalenko", Rating::from(450)).with_language("en", "uk"))
        .await
        .expect("Error registering interpreter");

    let order_id = OrderId::from_str("order-1001").unwrap();
    let order = NewOrder::new(order_id.clone(), "apt-1", "alice", "en", "uk");
    let (order, inserted) = api.process_new_order(order).await.expect("Error processing order");
    assert!(inserted);

    // Wave 1: the candidate is invited and ignores the invitation.
    let t1 = order.next_repeat_at.unwrap();
    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), t1).await.unwrap();
    assert_eq!(outcome, TickOutcome::WaveDispatched { wave: 1, invited: 1 });

    // Wave 2: the ignore is folded in, the candidate is re-invited, and declines this time.
    let order = api.db().fetch_order(&order_id).await.unwrap().unwrap();
    let t2 = order.next_repeat_at.unwrap();
    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), t2).await.unwrap();
    assert_eq!(outcome, TickOutcome::WaveDispatched { wave: 2, invited: 1 });
    api.decline_order(&order_id, terp.id).await.unwrap();

    // The repeat budget is spent: no wave 3 is ever scheduled, and the window close expires the order.
    let order = api.db().fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.remaining_repeats, 0);
    assert!(order.next_repeat_at.is_none());
    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), order.end_search_at).await.unwrap();
    assert_eq!(outcome, TickOutcome::Expired);

    let order = api.db().fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Expired);
    assert_eq!(order.current_wave, 2);
    let outcomes = api.db().outcomes_for_order(&order_id).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].outcome, CandidateOutcome::Declined);
    assert_eq!(transport.invites().await.len(), 2);
    support::tear_down(api).await;
}

#[tokio::test]
async fn a_zero_candidate_wave_still_consumes_a_repeat() {
    let (api, transport) = support::setup_api().await;
    let order_id = OrderId::from_str("order-1002").unwrap();
    let order = NewOrder::new(order_id.clone(), "apt-2", "alice", "en", "ja");
    let (order, _) = api.process_new_order(order).await.unwrap();

    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), order.next_repeat_at.unwrap()).await.unwrap();
    assert_eq!(outcome, TickOutcome::WaveDispatched { wave: 1, invited: 0 });

    let order = api.db().fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.remaining_repeats, 1);
    assert!(transport.invites().await.is_empty());
    support::tear_down(api).await;
}

#[tokio::test]
async fn ignored_candidates_are_retried_but_declined_ones_never_are() {
    let (api, transport) = support::setup_api().await;
    let decliner = api
        .db()
        .register_interpreter(NewInterpreter::new("Jonas Berg", Rating::from(480)).with_language("en", "sv"))
        .await
        .unwrap();
    let ignorer = api
        .db()
        .register_interpreter(NewInterpreter::new("Elsa Nilsson", Rating::from(430)).with_language("en", "sv"))
        .await
        .unwrap();

    let order_id = OrderId::from_str("order-1003").unwrap();
    let order = NewOrder::new(order_id.clone(), "apt-3", "bob", "en", "sv");
    let (order, _) = api.process_new_order(order).await.unwrap();

    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), order.next_repeat_at.unwrap()).await.unwrap();
    assert_eq!(outcome, TickOutcome::WaveDispatched { wave: 1, invited: 2 });
    api.decline_order(&order_id, decliner.id).await.unwrap();

    let order = api.db().fetch_order(&order_id).await.unwrap().unwrap();
    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), order.next_repeat_at.unwrap()).await.unwrap();
    assert_eq!(outcome, TickOutcome::WaveDispatched { wave: 2, invited: 1 });

    let wave2 = transport.invited_for_wave(2).await;
    assert_eq!(wave2, vec![ignorer.id]);
    let invites = api.db().invites_for_order(&order_id).await.unwrap();
    assert_eq!(invites.iter().filter(|i| i.wave == 2).count(), 1);
    support::tear_down(api).await;
}

#[tokio::test]
async fn blacklisted_interpreters_are_never_invited() {
    let (api, transport) = support::setup_api().await;
    let blocked = api
        .db()
        .register_interpreter(NewInterpreter::new("Ivan Petrov", Rating::from(500)).with_language("en", "ru"))
        .await
        .unwrap();
    api.db().blacklist_interpreter("carol", blocked.id).await.unwrap();

    let order_id = OrderId::from_str("order-1004").unwrap();
    let order = NewOrder::new(order_id.clone(), "apt-4", "carol", "en", "ru");
    let (order, _) = api.process_new_order(order).await.unwrap();

    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), order.next_repeat_at.unwrap()).await.unwrap();
    assert_eq!(outcome, TickOutcome::WaveDispatched { wave: 1, invited: 0 });
    assert!(transport.invites().await.is_empty());
    support::tear_down(api).await;
}

#[tokio::test]
async fn company_interpreters_get_the_first_wave_to_themselves() {
    let (api, transport) = support::setup_api().await;
    let in_house = api
        .db()
        .register_interpreter(
            NewInterpreter::new("Ana Souza", Rating::from(400)).with_language("en", "pt").employed_by("acme-health"),
        )
        .await
        .unwrap();
    let marketplace = api
        .db()
        .register_interpreter(NewInterpreter::new("Luis Prado", Rating::from(490)).with_language("en", "pt"))
        .await
        .unwrap();

    let order_id = OrderId::from_str("order-1005").unwrap();
    let order = NewOrder::new(order_id.clone(), "apt-5", "dave", "en", "pt").for_company("acme-health");
    let (order, _) = api.process_new_order(order).await.unwrap();

    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), order.next_repeat_at.unwrap()).await.unwrap();
    assert_eq!(outcome, TickOutcome::WaveDispatched { wave: 1, invited: 1 });
    assert_eq!(transport.invited_for_wave(1).await, vec![in_house.id]);

    // The second pass opens up to the whole marketplace.
    let order = api.db().fetch_order(&order_id).await.unwrap().unwrap();
    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), order.next_repeat_at.unwrap()).await.unwrap();
    assert_eq!(outcome, TickOutcome::WaveDispatched { wave: 2, invited: 2 });
    let mut wave2 = transport.invited_for_wave(2).await;
    wave2.sort();
    let mut expected = vec![in_house.id, marketplace.id];
    expected.sort();
    assert_eq!(wave2, expected);
    support::tear_down(api).await;
}

#[tokio::test]
async fn undeliverable_invitations_are_written_off_as_ignored() {
    let url = prepare_env::random_db_path();
    let db = prepare_env::prepare_test_env(&url).await;
    let transport = RecordingTransport::refusing();
    let broadcaster = RealtimeBroadcaster::new(SessionRegistry::new(), EventCache::new());
    let api = MatchFlowApi::new(db, transport, broadcaster, Default::default()).with_policy(support::test_policy());

    let terp = api
        .db()
        .register_interpreter(NewInterpreter::new("Karim Said", Rating::from(420)).with_language("en", "ar"))
        .await
        .unwrap();
    let order_id = OrderId::from_str("order-1006").unwrap();
    let order = NewOrder::new(order_id.clone(), "apt-6", "erin", "en", "ar");
    let (order, _) = api.process_new_order(order).await.unwrap();

    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), order.next_repeat_at.unwrap()).await.unwrap();
    // every delivery attempt failed, so nobody was actually invited
    assert_eq!(outcome, TickOutcome::WaveDispatched { wave: 1, invited: 0 });
    let outcomes = api.db().outcomes_for_order(&order_id).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].interpreter_id, terp.id);
    assert_eq!(outcomes[0].outcome, CandidateOutcome::Ignored);
    info!("🚀️ delivery failure test complete");
}

#[tokio::test]
async fn candidates_rank_by_priorities_then_rating_then_seniority() {
    use interp_match_engine::{order_objects::CandidateQueryFilter, traits::CandidateDirectory};
    let (api, _transport) = support::setup_api().await;
    // worse communication priority loses no matter how good the rating
    let backmarker = api
        .db()
        .register_interpreter(
            NewInterpreter::new("Rosa Quint", Rating::from(500)).with_language("en", "nl").with_priorities(2, 0, 0),
        )
        .await
        .unwrap();
    // equal priorities: the higher rating wins
    let star = api
        .db()
        .register_interpreter(
            NewInterpreter::new("Pieter Vos", Rating::from(480)).with_language("en", "nl").with_priorities(1, 0, 0),
        )
        .await
        .unwrap();
    let veteran = api
        .db()
        .register_interpreter(
            NewInterpreter::new("Inge Smit", Rating::from(460)).with_language("en", "nl").with_priorities(1, 0, 0),
        )
        .await
        .unwrap();
    // equal priorities and rating: earliest registered first
    let newcomer = api
        .db()
        .register_interpreter(
            NewInterpreter::new("Tom de Wit", Rating::from(460)).with_language("en", "nl").with_priorities(1, 0, 0),
        )
        .await
        .unwrap();

    let filter = CandidateQueryFilter::default().with_language_pair("en", "nl");
    let ranked = api.db().find_candidates(filter).await.unwrap();
    let ids: Vec<_> = ranked.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![star.id, veteran.id, newcomer.id, backmarker.id]);
    support::tear_down(api).await;
}

#[tokio::test]
async fn the_admin_warning_fires_exactly_once() {
    let policy = MatchingPolicy {
        on_demand: SearchPolicy {
            repeat_interval: RepeatInterval::FiveMinutes,
            max_repeats: 3,
            notify_admin_after: Duration::minutes(1),
            search_window: Duration::minutes(30),
        },
        pre_booked: MatchingPolicy::default().pre_booked,
        max_delivery_attempts: 2,
    };
    let url = prepare_env::random_db_path();
    let db = prepare_env::prepare_test_env(&url).await;

    let escalations = Arc::new(AtomicI32::new(0));
    let counter = escalations.clone();
    let mut hooks = EventHooks::default();
    hooks.on_admin_escalation(move |event| {
        let counter = counter.clone();
        Box::pin(async move {
            info!("🪝️ escalation for {:?}", event.order.order_id);
            counter.fetch_add(1, Ordering::SeqCst);
        })
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let broadcaster = RealtimeBroadcaster::new(SessionRegistry::new(), EventCache::new());
    let api = MatchFlowApi::new(db, RecordingTransport::default(), broadcaster, producers).with_policy(policy);

    let order_id = OrderId::from_str("order-1007").unwrap();
    let order = NewOrder::new(order_id.clone(), "apt-7", "frank", "en", "de");
    let (order, _) = api.process_new_order(order).await.unwrap();

    let t1 = order.next_repeat_at.unwrap();
    api.run_search_tick(JobTarget::Order(order_id.clone()), t1).await.unwrap();

    // The admin deadline passes before the next wave is due; the tick escalates and only waits.
    let stored = api.db().fetch_order(&order_id).await.unwrap().unwrap();
    let deadline = stored.notify_admin_at;
    let outcome = api.run_search_tick(JobTarget::Order(order_id.clone()), deadline).await.unwrap();
    assert_eq!(outcome, TickOutcome::Escalated);
    let stored = api.db().fetch_order(&order_id).await.unwrap().unwrap();
    assert!(stored.admin_notified());

    // A later early tick sees the latch and does not escalate again.
    let outcome = api
        .run_search_tick(JobTarget::Order(order_id.clone()), deadline + Duration::seconds(30))
        .await
        .unwrap();
    assert_eq!(outcome, TickOutcome::Waiting);

    // wait for the hook to drain
    for _ in 0..50 {
        if escalations.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(escalations.load(Ordering::SeqCst), 1);
}
