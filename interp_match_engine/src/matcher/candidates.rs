//! The candidate query builder.
//!
//! Translates an order and its search context into the [`CandidateQueryFilter`] specification the backend runs.
//! All filters are conjunctive; the ranking is fixed by the backend contract (communication-type priority, then
//! interpreting-type priority, then scheduling-type priority, then rating descending, then earliest registered).

use crate::{db_types::Order, matcher::scheduler::SearchContext, order_objects::CandidateQueryFilter};

/// Builds the candidate filter for the next wave of an order.
///
/// The first pass is scoped to the client company's own interpreters when it has any; every later pass searches
/// the whole marketplace. Interpreters that declined the order are excluded permanently, interpreters that merely
/// ignored an earlier wave stay eligible, and client blacklists always apply.
pub fn candidate_filter(order: &Order, ctx: &SearchContext) -> CandidateQueryFilter {
    let base = ctx.order_ctx();
    let mut filter = CandidateQueryFilter::default()
        .with_language_pair(order.lang_from.as_str(), order.lang_to.as_str())
        .with_topic(order.topic.as_str())
        .with_communication_type(order.communication_type)
        .with_not_blacklisted_by(order.customer_id.as_str())
        .with_exclude_declined_for(order.order_id.clone());
    if !base.is_first_search_completed && base.company_has_interpreters {
        filter = filter.with_company_scope(order.company_id.as_str());
    }
    filter
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::{
        db_types::{
            CommunicationType,
            InterpretingType,
            Order,
            OrderId,
            OrderStatusType,
            RepeatInterval,
            SchedulingType,
        },
        matcher::scheduler::OrderContext,
    };

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: 1,
            order_id: OrderId("ord-1".to_string()),
            appointment_id: "apt-1".to_string(),
            customer_id: "clinic-7".to_string(),
            company_id: "acme-health".to_string(),
            group_id: None,
            scheduling_type: SchedulingType::OnDemand,
            communication_type: CommunicationType::Phone,
            interpreting_type: InterpretingType::Consecutive,
            topic: "medical".to_string(),
            lang_from: "en".to_string(),
            lang_to: "uk".to_string(),
            starts_at: now + Duration::hours(1),
            ends_at: now + Duration::hours(2),
            status: OrderStatusType::Searching,
            assigned_interpreter: None,
            current_wave: 0,
            wave_started_at: None,
            next_repeat_at: Some(now),
            repeat_interval: RepeatInterval::TwoMinutes,
            remaining_repeats: 5,
            notify_admin_at: now + Duration::minutes(6),
            end_search_at: now + Duration::minutes(30),
            admin_notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ctx(order: &Order, company_has_interpreters: bool) -> SearchContext {
        SearchContext::Order(OrderContext {
            order: order.clone(),
            is_first_search_completed: order.current_wave >= 1,
            is_second_search_completed: order.current_wave >= 2,
            is_search_needed: true,
            send_notifications: true,
            set_red_flags: false,
            company_has_interpreters,
            time_to_restart: order.next_repeat_at,
        })
    }

    #[test]
    fn all_filters_are_applied_conjunctively() {
        let order = order();
        let filter = candidate_filter(&order, &ctx(&order, false));
        assert_eq!(filter.lang_from.as_deref(), Some("en"));
        assert_eq!(filter.lang_to.as_deref(), Some("uk"));
        assert_eq!(filter.topic.as_deref(), Some("medical"));
        assert_eq!(filter.communication_type, Some(CommunicationType::Phone));
        assert_eq!(filter.not_blacklisted_by.as_deref(), Some("clinic-7"));
        assert_eq!(filter.exclude_declined_for, Some(order.order_id.clone()));
        assert_eq!(filter.company_scope, None);
    }

    #[test]
    fn first_wave_is_company_scoped_when_the_company_has_interpreters() {
        let order = order();
        let filter = candidate_filter(&order, &ctx(&order, true));
        assert_eq!(filter.company_scope.as_deref(), Some("acme-health"));
    }

    #[test]
    fn later_waves_search_the_whole_marketplace() {
        let mut order = order();
        order.current_wave = 1;
        let filter = candidate_filter(&order, &ctx(&order, true));
        assert_eq!(filter.company_scope, None);
    }
}
