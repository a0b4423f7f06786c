//! Skirmish Core — shared domain abstractions.
//!
//! This crate defines the traits and types the combat context and its
//! adapters depend on: time, randomness, commands, errors, and the
//! versioned document store. It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod error;
pub mod repository;
pub mod rng;
