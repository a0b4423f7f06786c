//! Shared test mocks and utilities for the Skirmish combat tracker.

mod clock;
mod repository;
mod rng;

pub use clock::{FixedClock, ManualClock};
pub use repository::{FailingDocumentRepository, InMemoryDocumentRepository};
pub use rng::{MockRng, SequenceRng};
