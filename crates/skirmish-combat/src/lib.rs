//! Skirmish — combat encounter bounded context.
//!
//! Responsible for initiative order, turn and round advancement, hit point
//! bookkeeping, round-scoped effects and triggers, and the load → apply →
//! save cycle that keeps one encounter's state consistent under concurrent
//! writers.

pub mod application;
pub mod domain;
