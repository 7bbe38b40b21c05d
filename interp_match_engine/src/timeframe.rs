//! The wave clock.
//!
//! A [`TimeFrame`] is the pure scheduling state for one order's repeat cadence: when the next wave opens, how many
//! repeats are left, when the admins must be warned, and when the search closes for good. The scheduler advances it;
//! nothing in here touches a database or a clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{RepeatInterval, SchedulingType};

/// Search cadence and deadlines for one scheduling type.
#[derive(Debug, Clone, Copy)]
pub struct SearchPolicy {
    pub repeat_interval: RepeatInterval,
    /// Number of waves before the search stops requerying and waits for the window to close.
    pub max_repeats: u32,
    /// How long after the search opens the admins are warned about an unresolved order.
    pub notify_admin_after: Duration,
    /// The total search window. Once it has passed the order expires, whatever the repeat budget says.
    pub search_window: Duration,
}

/// Per-scheduling-type search policies, typically sourced from server configuration.
#[derive(Debug, Clone, Copy)]
pub struct MatchingPolicy {
    pub on_demand: SearchPolicy,
    pub pre_booked: SearchPolicy,
    /// How many delivery attempts a single invitation gets before the candidate is written off as `Ignored`.
    pub max_delivery_attempts: u32,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            on_demand: SearchPolicy {
                repeat_interval: RepeatInterval::TwoMinutes,
                max_repeats: 5,
                notify_admin_after: Duration::minutes(6),
                search_window: Duration::minutes(30),
            },
            pre_booked: SearchPolicy {
                repeat_interval: RepeatInterval::FifteenMinutes,
                max_repeats: 16,
                notify_admin_after: Duration::hours(2),
                search_window: Duration::hours(24),
            },
            max_delivery_attempts: 3,
        }
    }
}

impl MatchingPolicy {
    pub fn policy_for(&self, scheduling_type: SchedulingType) -> &SearchPolicy {
        match scheduling_type {
            SchedulingType::OnDemand => &self.on_demand,
            SchedulingType::PreBooked => &self.pre_booked,
        }
    }
}

//--------------------------------------       TimeFrame       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFrame {
    /// When the next wave opens. `None` once the repeat budget is spent.
    pub next_repeat_at: Option<DateTime<Utc>>,
    pub repeat_interval: RepeatInterval,
    pub remaining_repeats: u32,
    pub notify_admin_at: DateTime<Utc>,
    pub end_search_at: DateTime<Utc>,
}

impl TimeFrame {
    /// The frame for a freshly opened search. The first wave is due immediately.
    pub fn initial(scheduling_type: SchedulingType, policy: &MatchingPolicy, now: DateTime<Utc>) -> Self {
        let p = policy.policy_for(scheduling_type);
        Self {
            next_repeat_at: Some(now),
            repeat_interval: p.repeat_interval,
            remaining_repeats: p.max_repeats,
            notify_admin_at: now + p.notify_admin_after,
            end_search_at: now + p.search_window,
        }
    }

    /// Consume one repeat and move the clock forward.
    ///
    /// `remaining_repeats` decrements monotonically to 0. Once it reaches 0 `next_repeat_at` becomes `None` and no
    /// further wave is scheduled; the order either escalates to the admins or expires, depending on whether
    /// `end_search_at` has passed. Advancing an already-spent frame is a no-op.
    pub fn advance(mut self, now: DateTime<Utc>) -> Self {
        if self.remaining_repeats > 0 {
            self.remaining_repeats -= 1;
        }
        self.next_repeat_at =
            if self.remaining_repeats == 0 { None } else { Some(now + self.repeat_interval.duration()) };
        self
    }

    /// True once the search window has closed. Overrides any remaining repeat budget.
    pub fn is_exhausted(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_search_at
    }

    /// True when the admin warning deadline has passed. The caller is responsible for firing the escalation
    /// exactly once (the latch lives on the order record).
    pub fn admin_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.notify_admin_at
    }

    /// The next instant this order needs a scheduler tick: the earlier of the next wave, the admin warning
    /// (unless already latched) and the end of the search window.
    pub fn next_tick_at(&self, admin_notified: bool) -> DateTime<Utc> {
        let mut next = self.end_search_at;
        if let Some(t) = self.next_repeat_at {
            next = next.min(t);
        }
        if !admin_notified {
            next = next.min(self.notify_admin_at);
        }
        next
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(now: DateTime<Utc>) -> TimeFrame {
        TimeFrame::initial(SchedulingType::OnDemand, &MatchingPolicy::default(), now)
    }

    #[test]
    fn initial_frame_is_due_immediately() {
        let now = Utc::now();
        let tf = frame(now);
        assert_eq!(tf.next_repeat_at, Some(now));
        assert_eq!(tf.remaining_repeats, 5);
        assert!(!tf.is_exhausted(now));
        assert!(!tf.admin_due(now));
    }

    #[test]
    fn repeats_decrement_monotonically_and_never_go_negative() {
        let now = Utc::now();
        let mut tf = frame(now);
        let mut last = tf.remaining_repeats;
        for i in 0..10 {
            tf = tf.advance(now + Duration::minutes(2 * i));
            assert!(tf.remaining_repeats <= last);
            last = tf.remaining_repeats;
        }
        assert_eq!(tf.remaining_repeats, 0);
        assert_eq!(tf.next_repeat_at, None);
    }

    #[test]
    fn last_repeat_clears_the_next_wave() {
        let now = Utc::now();
        let mut tf = frame(now);
        tf.remaining_repeats = 2;
        let tf = tf.advance(now);
        assert_eq!(tf.remaining_repeats, 1);
        assert_eq!(tf.next_repeat_at, Some(now + Duration::minutes(2)));
        let tf = tf.advance(now + Duration::minutes(2));
        assert_eq!(tf.remaining_repeats, 0);
        assert_eq!(tf.next_repeat_at, None);
    }

    #[test]
    fn window_close_overrides_repeat_budget() {
        let now = Utc::now();
        let tf = frame(now);
        assert!(tf.remaining_repeats > 0);
        assert!(tf.is_exhausted(now + Duration::minutes(30)));
    }

    #[test]
    fn next_tick_prefers_the_earliest_deadline() {
        let now = Utc::now();
        let tf = frame(now).advance(now);
        // Next wave in 2 minutes, admin warning in 6, window close in 30.
        assert_eq!(tf.next_tick_at(false), now + Duration::minutes(2));
        let mut spent = tf;
        spent.remaining_repeats = 0;
        spent.next_repeat_at = None;
        assert_eq!(spent.next_tick_at(false), now + Duration::minutes(6));
        assert_eq!(spent.next_tick_at(true), now + Duration::minutes(30));
    }
}
