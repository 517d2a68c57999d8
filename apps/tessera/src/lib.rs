//! # tessera
//!
//! The Tessera application layer: settings, the MISP client, the HTTP API and
//! the CLI. All object semantics live in `tessera-core`.

pub mod api;
pub mod cli;
pub mod config;
pub mod misp;
