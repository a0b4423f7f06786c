//! Shared application state.

use std::sync::{Arc, Mutex};

use skirmish_combat::domain::resources::HpStatusPolicy;
use skirmish_core::clock::Clock;
use skirmish_core::repository::DocumentRepository;
use skirmish_core::rng::DeterministicRng;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock for timestamps.
    pub clock: Arc<dyn Clock + Send + Sync>,
    /// RNG for initiative rolls.
    pub rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    /// Encounter document store.
    pub repository: Arc<dyn DocumentRepository>,
    /// Thresholds for reported hit point status.
    pub hp_policy: HpStatusPolicy,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock + Send + Sync>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
        repository: Arc<dyn DocumentRepository>,
        hp_policy: HpStatusPolicy,
    ) -> Self {
        Self {
            clock,
            rng,
            repository,
            hp_policy,
        }
    }
}
