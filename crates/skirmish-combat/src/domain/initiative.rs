//! Initiative order: who acts when within a round.
//!
//! Entries are ordered by initiative descending, then dexterity descending.
//! The sort is stable, so identical rolls keep the order they were added in
//! and turn order is reproducible.

use serde::{Deserialize, Serialize};
use skirmish_core::rng::DeterministicRng;
use uuid::Uuid;

use super::errors::ValidationError;

/// Lowest accepted initiative, modifiers included.
pub const MIN_INITIATIVE: i32 = 1;
/// Highest accepted initiative, modifiers included.
pub const MAX_INITIATIVE: i32 = 30;
/// Lowest accepted dexterity score.
pub const MIN_DEXTERITY: i32 = 1;
/// Highest accepted dexterity score.
pub const MAX_DEXTERITY: i32 = 30;

/// A participant's slot in the initiative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    /// The participant this entry belongs to.
    pub participant_id: Uuid,
    /// Initiative total.
    pub initiative: i32,
    /// Dexterity score, used only to break initiative ties.
    pub dexterity: i32,
    /// Eligible to take turns.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Has taken a turn this round.
    #[serde(default)]
    pub has_acted: bool,
    /// Voluntarily gave up the turn slot and may re-enter later.
    #[serde(default)]
    pub is_delayed: bool,
    /// Pending readied action, if any.
    #[serde(default)]
    pub ready_action: Option<String>,
}

fn default_true() -> bool {
    true
}

impl InitiativeEntry {
    /// Creates an active entry that has not acted.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if initiative or dexterity is out of range.
    pub fn new(participant_id: Uuid, initiative: i32, dexterity: i32) -> Result<Self, ValidationError> {
        validate_initiative(initiative)?;
        validate_dexterity(dexterity)?;
        Ok(Self {
            participant_id,
            initiative,
            dexterity,
            is_active: true,
            has_acted: false,
            is_delayed: false,
            ready_action: None,
        })
    }
}

/// Checks that an initiative total is in range.
///
/// # Errors
///
/// Returns `ValidationError::InitiativeOutOfRange` otherwise.
pub fn validate_initiative(value: i32) -> Result<(), ValidationError> {
    if (MIN_INITIATIVE..=MAX_INITIATIVE).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InitiativeOutOfRange {
            value,
            min: MIN_INITIATIVE,
            max: MAX_INITIATIVE,
        })
    }
}

/// Checks that a dexterity score is in range.
///
/// # Errors
///
/// Returns `ValidationError::DexterityOutOfRange` otherwise.
pub fn validate_dexterity(value: i32) -> Result<(), ValidationError> {
    if (MIN_DEXTERITY..=MAX_DEXTERITY).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::DexterityOutOfRange {
            value,
            min: MIN_DEXTERITY,
            max: MAX_DEXTERITY,
        })
    }
}

/// Ability modifier for a score: `floor((score - 10) / 2)`.
#[must_use]
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Rolls initiative as 1d20 plus the dexterity modifier, clamped into the
/// accepted range.
#[allow(clippy::cast_possible_wrap)]
pub fn roll_initiative(dexterity: i32, rng: &mut dyn DeterministicRng) -> i32 {
    let natural = rng.next_u32_range(1, 20) as i32;
    (natural + ability_modifier(dexterity)).clamp(MIN_INITIATIVE, MAX_INITIATIVE)
}

/// Stable sort: initiative descending, dexterity descending on ties.
pub fn sort_entries(entries: &mut [InitiativeEntry]) {
    entries.sort_by(|a, b| {
        b.initiative
            .cmp(&a.initiative)
            .then_with(|| b.dexterity.cmp(&a.dexterity))
    });
}

/// The ranked sequence of initiative entries for an encounter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitiativeOrder {
    entries: Vec<InitiativeEntry>,
}

impl InitiativeOrder {
    /// Builds a sorted order from unsorted entries.
    #[must_use]
    pub fn from_entries(mut entries: Vec<InitiativeEntry>) -> Self {
        sort_entries(&mut entries);
        Self { entries }
    }

    /// Re-derives the order after initiative or dexterity changes.
    pub fn sort(&mut self) {
        sort_entries(&mut self.entries);
    }

    /// Entries in turn order.
    #[must_use]
    pub fn entries(&self) -> &[InitiativeEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a turn index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&InitiativeEntry> {
        self.entries.get(index)
    }

    /// Index of a participant's entry.
    #[must_use]
    pub fn position(&self, participant_id: Uuid) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.participant_id == participant_id)
    }

    /// A participant's entry.
    #[must_use]
    pub fn entry(&self, participant_id: Uuid) -> Option<&InitiativeEntry> {
        self.entries
            .iter()
            .find(|e| e.participant_id == participant_id)
    }

    /// Mutable access to a participant's entry.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ParticipantNotFound` if there is no entry.
    pub fn entry_mut(
        &mut self,
        participant_id: Uuid,
    ) -> Result<&mut InitiativeEntry, ValidationError> {
        self.entries
            .iter_mut()
            .find(|e| e.participant_id == participant_id)
            .ok_or(ValidationError::ParticipantNotFound(participant_id))
    }

    /// Adds an entry and re-sorts. Ties with existing entries place the new
    /// entry after them.
    pub fn insert(&mut self, entry: InitiativeEntry) {
        self.entries.push(entry);
        self.sort();
    }

    /// Removes a participant's entry, returning its former index.
    pub fn remove(&mut self, participant_id: Uuid) -> Option<(usize, InitiativeEntry)> {
        let index = self.position(participant_id)?;
        Some((index, self.entries.remove(index)))
    }

    /// Moves an entry to `index` without re-sorting.
    pub(crate) fn move_to(&mut self, from: usize, index: usize) {
        let entry = self.entries.remove(from);
        self.entries.insert(index, entry);
    }

    /// Changes a participant's initiative and dexterity, then re-sorts.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the participant has no entry or a value
    /// is out of range.
    pub fn update_entry(
        &mut self,
        participant_id: Uuid,
        initiative: i32,
        dexterity: i32,
    ) -> Result<(), ValidationError> {
        validate_initiative(initiative)?;
        validate_dexterity(dexterity)?;
        let entry = self.entry_mut(participant_id)?;
        entry.initiative = initiative;
        entry.dexterity = dexterity;
        self.sort();
        Ok(())
    }

    /// First active entry at or after `start`, without wrapping.
    #[must_use]
    pub fn next_active_from(&self, start: usize) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, e)| e.is_active)
            .map(|(i, _)| i)
    }

    /// Whether any entry is eligible to act.
    #[must_use]
    pub fn has_active(&self) -> bool {
        self.entries.iter().any(|e| e.is_active)
    }

    /// Clears `has_acted` on every entry for a new round.
    pub(crate) fn reset_round(&mut self) {
        for entry in &mut self.entries {
            entry.has_acted = false;
        }
    }

    pub(crate) fn entry_at_mut(&mut self, index: usize) -> Option<&mut InitiativeEntry> {
        self.entries.get_mut(index)
    }
}
