//! Commands for the combat context.

use skirmish_core::command::Command;
use uuid::Uuid;

/// Everything needed to put a combatant into an encounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatantSetup {
    /// Stable participant identifier.
    pub participant_id: Uuid,
    /// Display name.
    pub name: String,
    /// Maximum hit points.
    pub max_hit_points: i32,
    /// Starting hit points; defaults to the maximum.
    pub current_hit_points: Option<i32>,
    /// Starting temporary hit points.
    pub temporary_hit_points: i32,
    /// Armor class.
    pub armor_class: i32,
    /// Controlled by a player.
    pub is_player: bool,
    /// Initiative total; rolled as 1d20 + dexterity modifier when absent.
    pub initiative: Option<i32>,
    /// Dexterity score.
    pub dexterity: i32,
}

/// One mutating operation on an encounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatAction {
    /// Start combat with the given combatants plus any already staged.
    Start {
        /// Combatants joining at the start.
        combatants: Vec<CombatantSetup>,
    },
    /// End the current turn and hand it to the next active entry.
    NextTurn,
    /// Rewind the turn pointer to the previous turn.
    PreviousTurn,
    /// Suspend combat.
    Pause,
    /// Continue suspended combat.
    Resume,
    /// Finish combat.
    End,
    /// Correct a participant's initiative.
    UpdateInitiative {
        /// Whose entry to change.
        participant_id: Uuid,
        /// New initiative total.
        initiative: i32,
        /// New dexterity score.
        dexterity: i32,
    },
    /// The current turn holder gives up their slot for now.
    DelayAction {
        /// Must hold the current turn.
        participant_id: Uuid,
    },
    /// A delayed participant steps back in and takes the turn now.
    ResumeDelayed {
        /// A participant with `is_delayed` set.
        participant_id: Uuid,
    },
    /// Commit to an action that fires on a condition.
    ReadyAction {
        /// Who readies.
        participant_id: Uuid,
        /// What they ready.
        description: String,
    },
    /// The readied action's condition occurred.
    ResolveReadyAction {
        /// Whose readied action fires.
        participant_id: Uuid,
    },
    /// Deal damage.
    ApplyDamage {
        /// Target.
        participant_id: Uuid,
        /// Non-negative amount.
        amount: i32,
    },
    /// Heal.
    ApplyHealing {
        /// Target.
        participant_id: Uuid,
        /// Non-negative amount.
        amount: i32,
    },
    /// Grant temporary hit points.
    SetTemporaryHp {
        /// Target.
        participant_id: Uuid,
        /// Non-negative amount; kept only if larger than the current pool.
        amount: i32,
    },
    /// Change maximum hit points.
    SetMaxHp {
        /// Target.
        participant_id: Uuid,
        /// New maximum, at least 1.
        max_hit_points: i32,
    },
    /// Overwrite current hit points.
    SetCurrentHp {
        /// Target.
        participant_id: Uuid,
        /// New value, clamped into range.
        current_hit_points: i32,
    },
    /// Add a combatant before or during combat.
    AddParticipant {
        /// The new combatant.
        combatant: CombatantSetup,
    },
    /// Take a combatant out of the encounter entirely.
    RemoveParticipant {
        /// Who leaves.
        participant_id: Uuid,
    },
    /// Mark an entry eligible or ineligible to take turns.
    SetParticipantActive {
        /// Whose entry.
        participant_id: Uuid,
        /// New eligibility.
        active: bool,
    },
    /// Start tracking an effect.
    AddEffect {
        /// Identifier for the new effect.
        effect_id: Uuid,
        /// Who it applies to.
        target_participant_id: Uuid,
        /// Display name.
        name: String,
        /// Rounds it lasts.
        remaining_rounds: u32,
    },
    /// Stop tracking an effect early.
    RemoveEffect {
        /// Which effect.
        effect_id: Uuid,
    },
    /// Schedule a trigger.
    AddTrigger {
        /// Identifier for the new trigger.
        trigger_id: Uuid,
        /// Round it fires at.
        activation_round: u32,
        /// What happens.
        description: String,
    },
    /// Unschedule a trigger.
    RemoveTrigger {
        /// Which trigger.
        trigger_id: Uuid,
    },
}

impl CombatAction {
    /// The type name for this action (for logging and the action history).
    #[must_use]
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Start { .. } => "combat.start",
            Self::NextTurn => "combat.next_turn",
            Self::PreviousTurn => "combat.previous_turn",
            Self::Pause => "combat.pause",
            Self::Resume => "combat.resume",
            Self::End => "combat.end",
            Self::UpdateInitiative { .. } => "combat.update_initiative",
            Self::DelayAction { .. } => "combat.delay_action",
            Self::ResumeDelayed { .. } => "combat.resume_delayed",
            Self::ReadyAction { .. } => "combat.ready_action",
            Self::ResolveReadyAction { .. } => "combat.resolve_ready_action",
            Self::ApplyDamage { .. } => "combat.apply_damage",
            Self::ApplyHealing { .. } => "combat.apply_healing",
            Self::SetTemporaryHp { .. } => "combat.set_temporary_hp",
            Self::SetMaxHp { .. } => "combat.set_max_hp",
            Self::SetCurrentHp { .. } => "combat.set_current_hp",
            Self::AddParticipant { .. } => "combat.add_participant",
            Self::RemoveParticipant { .. } => "combat.remove_participant",
            Self::SetParticipantActive { .. } => "combat.set_participant_active",
            Self::AddEffect { .. } => "combat.add_effect",
            Self::RemoveEffect { .. } => "combat.remove_effect",
            Self::AddTrigger { .. } => "combat.add_trigger",
            Self::RemoveTrigger { .. } => "combat.remove_trigger",
        }
    }

    /// Whether this action may create the encounter when none is stored yet.
    #[must_use]
    pub fn creates_encounter(&self) -> bool {
        matches!(
            self,
            Self::Start { .. } | Self::AddParticipant { .. } | Self::AddTrigger { .. }
        )
    }
}

/// Command envelope targeting one encounter.
#[derive(Debug, Clone)]
pub struct EncounterCommand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The encounter to act on.
    pub encounter_id: Uuid,
    /// The version the caller last read. When set, a mismatch with the
    /// stored version rejects the command before it is applied.
    pub expected_version: Option<i64>,
    /// What to do.
    pub action: CombatAction,
}

impl EncounterCommand {
    /// Creates a command with a fresh correlation ID and no version check.
    #[must_use]
    pub fn new(encounter_id: Uuid, action: CombatAction) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            encounter_id,
            expected_version: None,
            action,
        }
    }

    /// Requires the stored version to equal `version`.
    #[must_use]
    pub fn expecting_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

impl Command for EncounterCommand {
    fn command_type(&self) -> &'static str {
        self.action.action_type()
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.encounter_id
    }
}
