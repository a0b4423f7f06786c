//! Persisted combat state for one encounter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::effects::RoundEffectTracker;
use super::errors::ValidationError;
use super::initiative::{InitiativeEntry, InitiativeOrder};
use super::resources::HitPoints;

/// Phase of the combat state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatPhase {
    /// Participants may be staged; no round has begun.
    #[default]
    NotStarted,
    /// Turns are being taken.
    Active,
    /// Turns are suspended; time does not accrue.
    Paused,
    /// Terminal. The state is read-only.
    Ended,
}

/// A combatant and their hit points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Hit point pool.
    #[serde(flatten)]
    pub hit_points: HitPoints,
    /// Armor class.
    pub armor_class: i32,
    /// Controlled by a player rather than the DM.
    pub is_player: bool,
}

/// One completed turn, recorded so the turn pointer can be rewound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Round the turn was taken in.
    pub round: u32,
    /// Turn index at the time.
    pub turn: usize,
    /// Who held the turn.
    pub participant_id: Uuid,
}

/// One applied command, recorded for the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Round when the command was applied.
    pub round: u32,
    /// Turn index when the command was applied.
    pub turn: usize,
    /// The participant the command concerned, if any.
    pub participant_id: Option<Uuid>,
    /// Command type, e.g. `combat.apply_damage`.
    pub action: String,
    /// Human-readable summary.
    pub description: String,
    /// When the command was applied.
    pub at: DateTime<Utc>,
}

/// The full state of one combat encounter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    /// State machine phase.
    pub phase: CombatPhase,
    /// Current round; 0 before combat starts.
    pub current_round: u32,
    /// Index into the initiative order of whoever holds the turn.
    pub current_turn: usize,
    /// When combat started.
    pub start_time: Option<DateTime<Utc>>,
    /// When combat ended.
    pub end_time: Option<DateTime<Utc>>,
    /// Everyone taking part.
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Turn order.
    #[serde(default)]
    pub initiative_order: InitiativeOrder,
    /// Completed turns, oldest first.
    #[serde(default)]
    pub turn_history: Vec<TurnRecord>,
    /// Milliseconds spent active, excluding the open accrual window.
    #[serde(default)]
    pub total_duration_ms: i64,
    /// Start of the open accrual window while combat is active.
    #[serde(default)]
    pub active_since: Option<DateTime<Utc>>,
    /// Most recent applied command.
    #[serde(default)]
    pub last_action: Option<ActionRecord>,
    /// Every applied command, oldest first.
    #[serde(default)]
    pub action_history: Vec<ActionRecord>,
    /// Round-scoped effects and triggers.
    #[serde(default)]
    pub effects: RoundEffectTracker,
}

impl CombatState {
    /// A fresh, not-yet-started encounter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Combat is running or paused.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.phase, CombatPhase::Active | CombatPhase::Paused)
    }

    /// Combat is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.phase == CombatPhase::Paused
    }

    /// Round and turn fields are meaningful.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.is_active() || self.phase == CombatPhase::Ended
    }

    /// Looks up a participant.
    #[must_use]
    pub fn participant(&self, participant_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == participant_id)
    }

    /// Mutable participant lookup.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ParticipantNotFound` for an unknown id.
    pub fn participant_mut(
        &mut self,
        participant_id: Uuid,
    ) -> Result<&mut Participant, ValidationError> {
        self.participants
            .iter_mut()
            .find(|p| p.id == participant_id)
            .ok_or(ValidationError::ParticipantNotFound(participant_id))
    }

    /// The entry holding the current turn, once combat has started.
    #[must_use]
    pub fn current_entry(&self) -> Option<&InitiativeEntry> {
        if !self.is_active() {
            return None;
        }
        self.initiative_order.get(self.current_turn)
    }

    /// Id of the participant holding the current turn.
    #[must_use]
    pub fn current_participant_id(&self) -> Option<Uuid> {
        self.current_entry().map(|e| e.participant_id)
    }

    /// Active milliseconds up to `now`, including the open window.
    #[must_use]
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        let open = self
            .active_since
            .map_or(0, |since| (now - since).num_milliseconds().max(0));
        self.total_duration_ms + open
    }

    pub(crate) fn open_accrual_window(&mut self, now: DateTime<Utc>) {
        self.active_since = Some(now);
    }

    pub(crate) fn close_accrual_window(&mut self, now: DateTime<Utc>) {
        if let Some(since) = self.active_since.take() {
            self.total_duration_ms += (now - since).num_milliseconds().max(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_elapsed_includes_open_window() {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let mut state = CombatState::new();
        state.total_duration_ms = 1_000;
        state.open_accrual_window(start);

        assert_eq!(state.elapsed_ms(start + Duration::seconds(2)), 3_000);
    }

    #[test]
    fn test_closing_window_accumulates_once() {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let mut state = CombatState::new();
        state.open_accrual_window(start);

        state.close_accrual_window(start + Duration::seconds(5));
        state.close_accrual_window(start + Duration::seconds(9));

        assert_eq!(state.total_duration_ms, 5_000);
        assert_eq!(state.active_since, None);
    }

    #[test]
    fn test_participant_hit_points_flatten_into_document() {
        let participant = Participant {
            id: Uuid::new_v4(),
            name: "Thorn".to_owned(),
            hit_points: HitPoints::new(75, 100, 5).unwrap(),
            armor_class: 16,
            is_player: true,
        };

        let json = serde_json::to_value(&participant).unwrap();

        assert_eq!(json["current_hit_points"], 75);
        assert_eq!(json["max_hit_points"], 100);
        assert_eq!(json["temporary_hit_points"], 5);
    }
}
