//! # Storage and collaborator interfaces.
//!
//! This module defines the interface contracts between the matching engine and its collaborators. The engine itself
//! never talks to a concrete database, queue or notification transport; it only sees these traits.
//!
//! ## Traits
//! * [`MatchingDatabase`] defines the highest level of behaviour for storage backends supporting the engine: order
//!   and group life cycles, the compare-and-set assignment guard, and the per-candidate outcome history.
//! * [`CandidateDirectory`] provides the interpreter lookups: the ranked candidate query, company scoping, and the
//!   availability check that arbitrates acceptances.
//! * [`JobQueue`] is the durable queue abstraction the worker pool consumes. Provisioning the underlying broker is
//!   out of scope; any store with an atomic claim suffices.
//! * [`InviteTransport`] delivers wave invitations (push notification or in-app realtime event).
//! * [`AdminAlert`] delivers escalation warnings to administrators.

mod candidate_directory;
mod data_objects;
mod job_queue;
mod matching_database;
mod notifiers;

pub use candidate_directory::{CandidateApiError, CandidateDirectory};
pub use data_objects::GroupAssignment;
pub use job_queue::{JobQueue, JobQueueError, JobTarget, NewSearchJob, SearchJob};
pub use matching_database::{MatchingDatabase, MatchingDbError};
pub use notifiers::{AdminAlert, AdminAlertMessage, DispatchError, InviteTransport};
