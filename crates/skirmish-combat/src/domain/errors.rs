//! Error types for the combat context.
//!
//! Every rejection is recoverable: the engine works on a copy of the state,
//! so a failed command never leaves a partial mutation behind.

use skirmish_core::error::DomainError;
use thiserror::Error;
use uuid::Uuid;

/// Malformed or inconsistent command input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Damage, healing, or hit point amounts must not be negative.
    #[error("amount must not be negative, got {0}")]
    NegativeAmount(i32),

    /// Initiative outside the accepted range.
    #[error("initiative {value} is outside {min}..={max}")]
    InitiativeOutOfRange {
        /// The rejected value.
        value: i32,
        /// Lowest accepted initiative.
        min: i32,
        /// Highest accepted initiative.
        max: i32,
    },

    /// Dexterity score outside the accepted range.
    #[error("dexterity {value} is outside {min}..={max}")]
    DexterityOutOfRange {
        /// The rejected value.
        value: i32,
        /// Lowest accepted score.
        min: i32,
        /// Highest accepted score.
        max: i32,
    },

    /// Maximum hit points must be at least 1.
    #[error("maximum hit points must be at least 1, got {0}")]
    InvalidMaxHitPoints(i32),

    /// No participant with this id takes part in the encounter.
    #[error("participant not found: {0}")]
    ParticipantNotFound(Uuid),

    /// A participant with this id already takes part in the encounter.
    #[error("participant {0} is already in the encounter")]
    DuplicateParticipant(Uuid),

    /// Combat cannot start without anyone in the initiative order.
    #[error("combat needs at least one combatant")]
    NoCombatants,

    /// A required text field was blank.
    #[error("{0} must not be empty")]
    EmptyText(&'static str),

    /// No effect with this id is being tracked.
    #[error("effect not found: {0}")]
    EffectNotFound(Uuid),

    /// No trigger with this id is being tracked.
    #[error("trigger not found: {0}")]
    TriggerNotFound(Uuid),

    /// A trigger was scheduled for a round that has already begun.
    #[error("trigger round {activation_round} is not after the current round {current_round}")]
    TriggerRoundPassed {
        /// The requested activation round.
        activation_round: u32,
        /// The round the encounter is in.
        current_round: u32,
    },

    /// The participant does not hold the current turn.
    #[error("it is not participant {0}'s turn")]
    NotParticipantsTurn(Uuid),

    /// The participant has not delayed their turn.
    #[error("participant {0} has not delayed")]
    NotDelayed(Uuid),

    /// The participant has no readied action to resolve.
    #[error("participant {0} has no readied action")]
    NoReadyAction(Uuid),
}

/// A command that is not valid for the encounter's current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// `start` was issued after combat had already started.
    #[error("combat has already started")]
    AlreadyStarted,

    /// The command needs running combat but combat is not active.
    #[error("combat is not active")]
    CombatNotActive,

    /// The command needs running combat but combat is paused.
    #[error("combat is paused")]
    CombatPaused,

    /// `resume` was issued while combat was not paused.
    #[error("combat is not paused")]
    CombatNotPaused,

    /// Combat has ended; the state is read-only.
    #[error("combat has already ended")]
    CombatAlreadyEnded,

    /// There is no turn to rewind to.
    #[error("no previous turn to return to")]
    NoPreviousTurn,

    /// Every entry in the initiative order is inactive.
    #[error("no active participants remain in the initiative order")]
    NoActiveParticipants,

    /// The participant is inactive or has already acted this round.
    #[error("participant is inactive or has already acted this round")]
    ParticipantUnavailable,
}

/// Broad classification of a [`CombatError`], used by callers to decide how
/// to surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input.
    Validation,
    /// The command does not fit the current phase.
    IllegalStateTransition,
    /// The stored version moved underneath the caller.
    ConcurrentModification,
    /// The encounter or participant does not exist.
    NotFound,
    /// Storage failure outside the domain's control.
    Infrastructure,
}

/// Top-level error for the combat context.
#[derive(Debug, Error)]
pub enum CombatError {
    /// Input was malformed or referenced something missing.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The command is not legal in the current phase.
    #[error("illegal state transition: {0}")]
    IllegalTransition(#[from] TransitionError),

    /// Persistence-level failure (not found, version conflict, storage).
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl CombatError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(ValidationError::ParticipantNotFound(_)) => ErrorKind::NotFound,
            Self::Validation(_) | Self::Domain(DomainError::Validation(_)) => {
                ErrorKind::Validation
            }
            Self::IllegalTransition(_) => ErrorKind::IllegalStateTransition,
            Self::Domain(DomainError::ConcurrencyConflict { .. }) => {
                ErrorKind::ConcurrentModification
            }
            Self::Domain(DomainError::AggregateNotFound(_)) => ErrorKind::NotFound,
            Self::Domain(DomainError::Infrastructure(_)) => ErrorKind::Infrastructure,
        }
    }

    /// A short follow-up suggestion for the caller, if there is one.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::ConcurrentModification => Some("reload the encounter and retry"),
            ErrorKind::IllegalStateTransition => {
                Some("reload the encounter to see its current phase")
            }
            _ => None,
        }
    }
}
