//! Skirmish combat tracker — HTTP adapter.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
