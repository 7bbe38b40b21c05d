//! # Interpreter Match Server
//!
//! The daemon that runs the matching engine. It is responsible for:
//! * Loading configuration from the environment.
//! * Opening the database and bringing the schema up to date.
//! * Wiring the event hooks (admin escalation alerts, assignment logging).
//! * Starting the realtime broadcaster and the search worker pool.
//!
//! The HTTP/WS transport in front of the engine lives in a separate service; this binary only hosts the matching
//! core and its realtime fan-out.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.

pub mod alerts;
pub mod cli;
pub mod config;
pub mod errors;
pub mod search_workers;
pub mod server;
pub mod transport;
