//! Hold'em server: WebSocket transport over the table engine, plus the
//! configuration, logging and metrics the binary wires together.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
