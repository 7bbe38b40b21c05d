//! # The matching core.
//!
//! [`MatchFlowApi`] is the primary API for the order matching and dispatch engine. It composes the candidate query
//! builder, the wave scheduler, the group coordinator, the dispatch notifier and the realtime broadcaster, and is
//! generic over the storage/queue backend so it can be driven against any [`crate::traits`] implementation.

mod candidates;
mod dispatch;
mod errors;
mod flow_api;
mod group;
mod scheduler;

pub use candidates::candidate_filter;
pub use dispatch::{DispatchNotifier, WaveReport};
pub use errors::MatchingError;
pub use flow_api::MatchFlowApi;
pub use group::GroupCoordinator;
pub use scheduler::{GroupContext, OrderContext, SearchContext, TickOutcome};
