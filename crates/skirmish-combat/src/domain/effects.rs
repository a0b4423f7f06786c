//! Round-scoped effects and scheduled triggers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::ValidationError;

/// A buff or debuff on a participant that lasts a number of rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    /// Effect identifier.
    pub id: Uuid,
    /// The participant the effect applies to.
    pub target_participant_id: Uuid,
    /// Rounds left. An effect that reaches zero expires at the round boundary.
    pub remaining_rounds: u32,
    /// Display name.
    pub name: String,
}

/// A one-time event bound to a future round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger identifier.
    pub id: Uuid,
    /// The round at whose start the trigger fires.
    pub activation_round: u32,
    /// What happens.
    pub description: String,
    /// Set once, when the trigger fires. Fired triggers are kept for history.
    #[serde(default)]
    pub fired: bool,
}

/// Ids reported by a round boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundAdvance {
    /// Effects that expired and were removed.
    pub expired: Vec<Uuid>,
    /// Triggers that fired.
    pub activated: Vec<Uuid>,
}

impl RoundAdvance {
    /// Appends another batch to this one.
    pub fn extend(&mut self, other: RoundAdvance) {
        self.expired.extend(other.expired);
        self.activated.extend(other.activated);
    }
}

/// Owns the active effects and triggers of one encounter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEffectTracker {
    #[serde(default)]
    effects: Vec<Effect>,
    #[serde(default)]
    triggers: Vec<Trigger>,
}

impl RoundEffectTracker {
    /// Active effects.
    #[must_use]
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// All triggers, fired ones included.
    #[must_use]
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Starts tracking an effect.
    pub fn add_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Stops tracking an effect.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EffectNotFound` for an unknown id.
    pub fn remove_effect(&mut self, effect_id: Uuid) -> Result<Effect, ValidationError> {
        let index = self
            .effects
            .iter()
            .position(|e| e.id == effect_id)
            .ok_or(ValidationError::EffectNotFound(effect_id))?;
        Ok(self.effects.remove(index))
    }

    /// Drops every effect targeting a participant, returning their ids.
    pub fn remove_effects_for(&mut self, participant_id: Uuid) -> Vec<Uuid> {
        let mut removed = Vec::new();
        self.effects.retain(|e| {
            let keep = e.target_participant_id != participant_id;
            if !keep {
                removed.push(e.id);
            }
            keep
        });
        removed
    }

    /// Schedules a trigger.
    pub fn add_trigger(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    /// Unschedules a trigger, fired or not.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::TriggerNotFound` for an unknown id.
    pub fn remove_trigger(&mut self, trigger_id: Uuid) -> Result<Trigger, ValidationError> {
        let index = self
            .triggers
            .iter()
            .position(|t| t.id == trigger_id)
            .ok_or(ValidationError::TriggerNotFound(trigger_id))?;
        Ok(self.triggers.remove(index))
    }

    /// Applies a round boundary: every effect loses a round and those at
    /// zero expire; unfired triggers for `new_round` fire.
    pub fn on_round_advance(&mut self, new_round: u32) -> RoundAdvance {
        let mut advance = RoundAdvance::default();

        for effect in &mut self.effects {
            effect.remaining_rounds = effect.remaining_rounds.saturating_sub(1);
        }
        self.effects.retain(|e| {
            if e.remaining_rounds == 0 {
                advance.expired.push(e.id);
                false
            } else {
                true
            }
        });

        advance.activated = self.fire_triggers(new_round);
        advance
    }

    /// Fires the unfired triggers scheduled for `round` without touching
    /// effects. Used when combat opens round 1, which has no boundary before it.
    pub fn fire_triggers(&mut self, round: u32) -> Vec<Uuid> {
        let mut fired = Vec::new();
        for trigger in &mut self.triggers {
            if !trigger.fired && trigger.activation_round == round {
                trigger.fired = true;
                fired.push(trigger.id);
            }
        }
        fired
    }
}
