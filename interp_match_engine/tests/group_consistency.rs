//! Same-interpreter group semantics: all-or-none assignment, provisional-acceptance rollback, group rejection.

use std::str::FromStr;

use chrono::{Duration, Utc};
use ims_common::Rating;
use interp_match_engine::{
    db_types::{
        CandidateOutcome,
        GroupId,
        NewInterpreter,
        NewOrder,
        NewOrderGroup,
        OrderId,
        OrderStatusType,
    },
    traits::{JobTarget, MatchingDatabase},
    MatchingError,
    TickOutcome,
};

mod support;

fn two_day_booking(group_id: &GroupId, customer: &str) -> (NewOrderGroup, Vec<NewOrder>) {
    let day1 = Utc::now() + Duration::days(1);
    let day2 = Utc::now() + Duration::days(2);
    let group = NewOrderGroup::new(group_id.clone(), true);
    let members = vec![
        NewOrder::new(
            OrderId(format!("{}-day1", group_id.as_str())),
            format!("apt-{}-1", group_id.as_str()),
            customer,
            "en",
            "uk",
        )
        .with_window(day1, day1 + Duration::hours(2)),
        NewOrder::new(
            OrderId(format!("{}-day2", group_id.as_str())),
            format!("apt-{}-2", group_id.as_str()),
            customer,
            "en",
            "uk",
        )
        .with_window(day2, day2 + Duration::hours(2)),
    ];
    (group, members)
}

#[tokio::test]
async fn accepting_one_member_assigns_the_whole_group_atomically() {
    let (api, _transport) = support::setup_api().await;
    let terp = api
        .db()
        .register_interpreter(NewInterpreter::new("Olena Bondar", Rating::from(480)).with_language("en", "uk"))
        .await
        .unwrap();

    let group_id = GroupId::from("grp-3001".to_string());
    let (group, members) = two_day_booking(&group_id, "alice");
    let (_, members) = api.process_new_group(group, members).await.unwrap();

    let assigned = api.accept_order(&members[0].order_id, terp.id).await.unwrap();
    assert_eq!(assigned.len(), 2);
    for order in &assigned {
        assert_eq!(order.status, OrderStatusType::Assigned);
        assert_eq!(order.assigned_interpreter, Some(terp.id));
    }
    let group = api.db().fetch_group(&group_id).await.unwrap().unwrap();
    assert_eq!(group.resolved_interpreter, Some(terp.id));
    assert!(!group.is_rejected);
    support::tear_down(api).await;
}

#[tokio::test]
async fn a_day_two_conflict_rolls_the_acceptance_back_to_ignored() {
    let (api, _transport) = support::setup_api().await;
    let terp = api
        .db()
        .register_interpreter(NewInterpreter::new("Olena Bondar", Rating::from(480)).with_language("en", "uk"))
        .await
        .unwrap();

    let group_id = GroupId::from("grp-3002".to_string());
    let (group, members) = two_day_booking(&group_id, "bob");
    let (_, members) = api.process_new_group(group, members).await.unwrap();

    // The interpreter is already booked solid over the day-2 window.
    let clash_id = OrderId::from_str("order-3002-clash").unwrap();
    let clash = NewOrder::new(clash_id.clone(), "apt-clash", "someone-else", "en", "uk")
        .with_window(members[1].starts_at, members[1].ends_at);
    api.process_new_order(clash).await.unwrap();
    api.accept_order(&clash_id, terp.id).await.unwrap();

    // Day-1 acceptance is provisional and must roll back when day 2 cannot be covered.
    let result = api.accept_order(&members[0].order_id, terp.id).await;
    assert!(matches!(result, Err(MatchingError::AcceptanceConflict(_))));

    let day1 = api.db().fetch_order(&members[0].order_id).await.unwrap().unwrap();
    assert_eq!(day1.status, OrderStatusType::Searching, "the group member keeps searching");
    let outcomes = api.db().outcomes_for_order(&members[0].order_id).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].interpreter_id, terp.id);
    assert_eq!(outcomes[0].outcome, CandidateOutcome::Ignored);
    let group = api.db().fetch_group(&group_id).await.unwrap().unwrap();
    assert_eq!(group.resolved_interpreter, None);
    support::tear_down(api).await;
}

#[tokio::test]
async fn a_group_is_rejected_only_after_every_member_closes() {
    let (api, _transport) = support::setup_api().await;
    let group_id = GroupId::from("grp-3003".to_string());
    let (group, members) = two_day_booking(&group_id, "carol");
    let (_, members) = api.process_new_group(group, members).await.unwrap();

    // First member expires; the group is still alive because day 2 keeps searching.
    let first = &members[0];
    let outcome = api.run_search_tick(JobTarget::Order(first.order_id.clone()), first.end_search_at).await.unwrap();
    assert_eq!(outcome, TickOutcome::Expired);
    let outcome = api.run_search_tick(JobTarget::Group(group_id.clone()), Utc::now()).await.unwrap();
    assert_eq!(outcome, TickOutcome::GroupEvaluated { rejected: false });

    // Second member expires; now the whole group is rejected.
    let second = &members[1];
    let outcome = api.run_search_tick(JobTarget::Order(second.order_id.clone()), second.end_search_at).await.unwrap();
    assert_eq!(outcome, TickOutcome::Expired);
    let outcome = api.run_search_tick(JobTarget::Group(group_id.clone()), Utc::now()).await.unwrap();
    assert_eq!(outcome, TickOutcome::GroupEvaluated { rejected: true });
    let group = api.db().fetch_group(&group_id).await.unwrap().unwrap();
    assert!(group.is_rejected);
    support::tear_down(api).await;
}

#[tokio::test]
async fn members_of_a_free_choice_group_resolve_independently() {
    let (api, _transport) = support::setup_api().await;
    let terp = api
        .db()
        .register_interpreter(NewInterpreter::new("Marta Lindqvist", Rating::from(450)).with_language("en", "uk"))
        .await
        .unwrap();

    let group_id = GroupId::from("grp-3004".to_string());
    let (mut group, members) = two_day_booking(&group_id, "dave");
    group.same_interpreter = false;
    let (_, members) = api.process_new_group(group, members).await.unwrap();

    let assigned = api.accept_order(&members[0].order_id, terp.id).await.unwrap();
    assert_eq!(assigned.len(), 1);
    let day2 = api.db().fetch_order(&members[1].order_id).await.unwrap().unwrap();
    assert_eq!(day2.status, OrderStatusType::Searching);
    let group = api.db().fetch_group(&group_id).await.unwrap().unwrap();
    assert_eq!(group.resolved_interpreter, None);
    support::tear_down(api).await;
}
