//! Interpreter Match Engine
//!
//! The Interpreter Match Engine is the matching and dispatch core of the interpretation-services marketplace. Given an
//! open appointment order it repeatedly queries eligible interpreters, issues time-boxed invitation waves, tracks
//! accept/decline/ignore outcomes, enforces same-interpreter constraints for grouped bookings, and escalates to
//! administrators when a search is at risk of running out of time. It is transport-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Storage management and control ([`mod@traits`] and the SQLite backend). You should never need to access the
//!    database directly. Instead, use the public API provided by the engine. The exception is the data types used by
//!    the backends; these are defined in the `db_types` module and are public.
//! 2. The engine public API ([`MatchFlowApi`]). This is the public-facing functionality of the matching engine. It is
//!    responsible for opening searches, running search ticks, and arbitrating acceptances. Specific backends need to
//!    implement the traits in [`mod@traits`] in order to act as a backend for the engine.
//! 3. Realtime delivery ([`mod@realtime`]). Every state transition is pushed to connected sessions and cached per
//!    (user, event type) so that a reconnecting client can recover the last known state.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted when certain actions
//! occur within the engine, for example when an order is assigned an `OrderAssignedEvent` is emitted. A simple actor
//! framework is used so that you can easily hook into these events and perform custom actions.

pub mod db_types;
pub mod events;
pub mod order_objects;
pub mod realtime;
pub mod timeframe;
pub mod traits;
pub mod workers;

mod matcher;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use matcher::{
    candidate_filter,
    DispatchNotifier,
    GroupContext,
    GroupCoordinator,
    MatchFlowApi,
    MatchingError,
    OrderContext,
    SearchContext,
    TickOutcome,
    WaveReport,
};
pub use timeframe::{MatchingPolicy, SearchPolicy, TimeFrame};
