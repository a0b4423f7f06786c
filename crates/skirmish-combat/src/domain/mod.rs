//! Domain model for combat encounters.

pub mod commands;
pub mod effects;
pub mod engine;
pub mod errors;
pub mod initiative;
pub mod resources;
pub mod state;
