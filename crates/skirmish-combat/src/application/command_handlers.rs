//! Command handlers for the combat context.
//!
//! Every command follows the same read-modify-write: load the encounter
//! document, run the action through the [`TurnEngine`], save the new snapshot
//! with the version that was read. A version mismatch at either end surfaces
//! as `DomainError::ConcurrencyConflict`; nothing is merged or retried here.

use std::sync::Mutex;

use skirmish_core::clock::Clock;
use skirmish_core::command::Command;
use skirmish_core::error::DomainError;
use skirmish_core::repository::{DocumentRepository, StoredDocument};
use skirmish_core::rng::DeterministicRng;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::commands::EncounterCommand;
use crate::domain::engine::TurnEngine;
use crate::domain::errors::{CombatError, ErrorKind};
use crate::domain::state::CombatState;

/// Result of a successfully handled command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The encounter the command applied to.
    pub encounter_id: Uuid,
    /// Stored version after the save.
    pub version: i64,
    /// The new state.
    pub state: CombatState,
    /// Effects that expired at a round boundary this command crossed.
    pub expired_effects: Vec<Uuid>,
    /// Triggers that fired at a round boundary this command crossed.
    pub activated_triggers: Vec<Uuid>,
}

/// Decodes a stored document into combat state.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the payload does not deserialize.
pub(crate) fn decode(document: &StoredDocument) -> Result<CombatState, DomainError> {
    serde_json::from_value(document.payload.clone()).map_err(|e| {
        DomainError::Infrastructure(format!(
            "combat state deserialization failed for {}: {e}",
            document.aggregate_id
        ))
    })
}

fn encode(state: &CombatState) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(state)
        .map_err(|e| DomainError::Infrastructure(format!("combat state serialization failed: {e}")))
}

/// Loads an encounter and the version it was stored at.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if nothing is stored for the id,
/// or `DomainError::Infrastructure` if loading or decoding fails.
pub async fn load_encounter(
    encounter_id: Uuid,
    repo: &dyn DocumentRepository,
) -> Result<(CombatState, i64), DomainError> {
    let document = repo
        .load_document(encounter_id)
        .await?
        .ok_or(DomainError::AggregateNotFound(encounter_id))?;
    Ok((decode(&document)?, document.version))
}

/// Applies commands to stored encounters.
///
/// Borrows its collaborators so a request handler can build one per call
/// from shared application state.
pub struct CombatSession<'a> {
    clock: &'a dyn Clock,
    rng: &'a Mutex<dyn DeterministicRng + Send>,
    repo: &'a dyn DocumentRepository,
    engine: TurnEngine,
}

impl<'a> CombatSession<'a> {
    /// Creates a session over the given collaborators.
    #[must_use]
    pub fn new(
        clock: &'a dyn Clock,
        rng: &'a Mutex<dyn DeterministicRng + Send>,
        repo: &'a dyn DocumentRepository,
    ) -> Self {
        Self {
            clock,
            rng,
            repo,
            engine: TurnEngine::new(),
        }
    }

    /// Handles one command end to end.
    ///
    /// An encounter with no stored document is created on the fly only for
    /// commands that can open one (`start`, `add_participant`,
    /// `add_trigger`); anything else is `AggregateNotFound`.
    ///
    /// The RNG `Mutex` is locked only around the synchronous engine call so
    /// no guard is held across an await point.
    ///
    /// # Errors
    ///
    /// Returns `CombatError` if the command is rejected by the engine, the
    /// caller's `expected_version` is stale, another writer saved first, or
    /// the repository fails.
    #[instrument(
        skip_all,
        fields(
            encounter_id = %command.encounter_id,
            command_type = command.command_type(),
            correlation_id = %command.correlation_id(),
        )
    )]
    pub async fn execute(&self, command: &EncounterCommand) -> Result<CommandOutcome, CombatError> {
        let result = self.run(command).await;
        match &result {
            Ok(outcome) => info!(version = outcome.version, "combat command applied"),
            Err(err) if err.kind() == ErrorKind::Infrastructure => {
                warn!(error = %err, "combat command failed");
            }
            Err(err) => warn!(error = %err, kind = ?err.kind(), "combat command rejected"),
        }
        result
    }

    async fn run(&self, command: &EncounterCommand) -> Result<CommandOutcome, CombatError> {
        let encounter_id = command.encounter_id;
        let (state, version) = match self.repo.load_document(encounter_id).await? {
            Some(document) => (decode(&document)?, document.version),
            None if command.action.creates_encounter() => (CombatState::new(), 0),
            None => return Err(DomainError::AggregateNotFound(encounter_id).into()),
        };

        if let Some(expected) = command.expected_version {
            if expected != version {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: encounter_id,
                    expected,
                    actual: version,
                }
                .into());
            }
        }

        let now = self.clock.now();
        // Lock RNG only for the synchronous engine call; never across an await.
        let transition = {
            let mut rng_guard = self
                .rng
                .lock()
                .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
            self.engine
                .apply(&state, &command.action, now, &mut *rng_guard)?
        };

        let payload = encode(&transition.state)?;
        let version = self
            .repo
            .save_document(encounter_id, version, payload, now)
            .await?;

        Ok(CommandOutcome {
            encounter_id,
            version,
            state: transition.state,
            expired_effects: transition.expired_effects,
            activated_triggers: transition.activated_triggers,
        })
    }
}

/// Handles one command with a short-lived [`CombatSession`].
///
/// # Errors
///
/// See [`CombatSession::execute`].
pub async fn handle_command(
    command: &EncounterCommand,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    repo: &dyn DocumentRepository,
) -> Result<CommandOutcome, CombatError> {
    CombatSession::new(clock, rng, repo).execute(command).await
}
