//! Application services for combat encounters.

pub mod command_handlers;
pub mod query_handlers;
