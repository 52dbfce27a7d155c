//! reelvote: movie voting service.
//!
//! The domain logic lives in [`reelvote_core`]; this crate wires it to its
//! collaborators and surfaces:
//!
//! * [`contracts`]: vote sources and sinks (filesystem bucket, in-process chain).
//! * [`ledger`]: points ledger behind the leaderboard.
//! * [`state`]: shared application state and the JSON state file.
//! * [`server`]: the HTTP API.
//! * [`config`]: environment configuration for the server.

pub mod config;
pub mod contracts;
pub mod ledger;
pub mod server;
pub mod state;

