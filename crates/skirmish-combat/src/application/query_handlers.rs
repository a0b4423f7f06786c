//! Query handlers for the combat context.
//!
//! Loads the stored encounter document and returns a read-only view with
//! derived values (hit point status, elapsed time) filled in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use skirmish_core::clock::Clock;
use skirmish_core::error::DomainError;
use skirmish_core::repository::DocumentRepository;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::effects::{Effect, Trigger};
use crate::domain::initiative::InitiativeEntry;
use crate::domain::resources::{HpStatus, HpStatusPolicy};
use crate::domain::state::{ActionRecord, CombatPhase, CombatState, Participant};

/// Read-only view of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantView {
    /// Participant identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current hit points.
    pub current_hit_points: i32,
    /// Maximum hit points.
    pub max_hit_points: i32,
    /// Temporary hit points.
    pub temporary_hit_points: i32,
    /// Current plus temporary.
    pub effective_hit_points: i32,
    /// Armor class.
    pub armor_class: i32,
    /// Controlled by a player.
    pub is_player: bool,
    /// Derived health classification.
    pub hp_status: HpStatus,
    /// Still has current hit points.
    pub is_alive: bool,
}

impl ParticipantView {
    fn from_participant(participant: &Participant, policy: &HpStatusPolicy) -> Self {
        let hp = participant.hit_points;
        Self {
            id: participant.id,
            name: participant.name.clone(),
            current_hit_points: hp.current,
            max_hit_points: hp.maximum,
            temporary_hit_points: hp.temporary,
            effective_hit_points: hp.effective(),
            armor_class: participant.armor_class,
            is_player: participant.is_player,
            hp_status: hp.status(policy),
            is_alive: hp.is_alive(),
        }
    }
}

/// Read-only view of an encounter.
#[derive(Debug, Clone, Serialize)]
pub struct EncounterView {
    /// The encounter identifier.
    pub encounter_id: Uuid,
    /// Stored version; send it back as `expected_version` to guard writes.
    pub version: i64,
    /// State machine phase.
    pub phase: CombatPhase,
    /// Current round, 0 before start.
    pub current_round: u32,
    /// Index of the current turn in `initiative_order`.
    pub current_turn: usize,
    /// Who holds the turn, while combat is running or paused.
    pub current_participant_id: Option<Uuid>,
    /// When combat started.
    pub start_time: Option<DateTime<Utc>>,
    /// When combat ended.
    pub end_time: Option<DateTime<Utc>>,
    /// Active milliseconds so far, excluding paused time.
    pub elapsed_ms: i64,
    /// Participants with derived values.
    pub participants: Vec<ParticipantView>,
    /// Turn order.
    pub initiative_order: Vec<InitiativeEntry>,
    /// Active effects.
    pub effects: Vec<Effect>,
    /// Scheduled and fired triggers.
    pub triggers: Vec<Trigger>,
    /// Most recent applied command.
    pub last_action: Option<ActionRecord>,
    /// Every applied command, oldest first.
    pub action_history: Vec<ActionRecord>,
}

impl EncounterView {
    /// Builds a view of `state` as of `now`.
    #[must_use]
    pub fn build(
        encounter_id: Uuid,
        version: i64,
        state: &CombatState,
        now: DateTime<Utc>,
        policy: &HpStatusPolicy,
    ) -> Self {
        Self {
            encounter_id,
            version,
            phase: state.phase,
            current_round: state.current_round,
            current_turn: state.current_turn,
            current_participant_id: state.current_participant_id(),
            start_time: state.start_time,
            end_time: state.end_time,
            elapsed_ms: state.elapsed_ms(now),
            participants: state
                .participants
                .iter()
                .map(|p| ParticipantView::from_participant(p, policy))
                .collect(),
            initiative_order: state.initiative_order.entries().to_vec(),
            effects: state.effects.effects().to_vec(),
            triggers: state.effects.triggers().to_vec(),
            last_action: state.last_action.clone(),
            action_history: state.action_history.clone(),
        }
    }
}

/// Retrieves an encounter by id.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if nothing is stored for the id.
/// Returns `DomainError::Infrastructure` if loading or decoding fails.
pub async fn get_encounter(
    encounter_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn DocumentRepository,
    policy: &HpStatusPolicy,
) -> Result<EncounterView, DomainError> {
    let (state, version) = command_handlers::load_encounter(encounter_id, repo).await?;
    Ok(EncounterView::build(
        encounter_id,
        version,
        &state,
        clock.now(),
        policy,
    ))
}
