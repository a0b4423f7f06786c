//! The turn engine: the combat state machine.
//!
//! `NotStarted → Active ⇄ Paused → Ended`. [`TurnEngine::apply`] takes a
//! snapshot and an action and returns a new snapshot; the input is never
//! touched, so a rejected action leaves nothing half-applied and a caller
//! retrying after a version conflict can simply reload and apply again.

use chrono::{DateTime, Utc};
use skirmish_core::rng::DeterministicRng;
use uuid::Uuid;

use super::commands::{CombatAction, CombatantSetup};
use super::effects::{Effect, RoundAdvance, Trigger};
use super::errors::{CombatError, TransitionError, ValidationError};
use super::initiative::{InitiativeEntry, roll_initiative, validate_dexterity};
use super::resources::HitPoints;
use super::state::{ActionRecord, CombatPhase, CombatState, Participant, TurnRecord};

/// The outcome of a successfully applied action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The new snapshot.
    pub state: CombatState,
    /// Effects that expired at a round boundary crossed by this action.
    pub expired_effects: Vec<Uuid>,
    /// Triggers that fired when this action opened a round.
    pub activated_triggers: Vec<Uuid>,
}

/// Applies combat actions to state snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnEngine;

/// Who held the turn before a re-sort, and at which index.
type Holder = Option<(Uuid, usize)>;

type Applied = Result<(Option<Uuid>, String), CombatError>;

impl TurnEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Applies one action to a snapshot.
    ///
    /// `rng` is only consulted when a combatant joins without an initiative.
    ///
    /// # Errors
    ///
    /// Returns `CombatError::IllegalTransition` when the action does not fit
    /// the current phase and `CombatError::Validation` for bad input. The
    /// input snapshot is unchanged either way.
    pub fn apply(
        &self,
        state: &CombatState,
        action: &CombatAction,
        now: DateTime<Utc>,
        rng: &mut dyn DeterministicRng,
    ) -> Result<Transition, CombatError> {
        if state.phase == CombatPhase::Ended {
            return Err(TransitionError::CombatAlreadyEnded.into());
        }

        let mut next = state.clone();
        let mut advance = RoundAdvance::default();
        let (round, turn) = (next.current_round, next.current_turn);

        let (participant_id, description) = match action {
            CombatAction::Start { combatants } => {
                start(&mut next, &mut advance, combatants, now, rng)
            }
            CombatAction::NextTurn => next_turn(&mut next, &mut advance),
            CombatAction::PreviousTurn => previous_turn(&mut next),
            CombatAction::Pause => pause(&mut next, now),
            CombatAction::Resume => resume(&mut next, now),
            CombatAction::End => end(&mut next, now),
            CombatAction::UpdateInitiative {
                participant_id,
                initiative,
                dexterity,
            } => update_initiative(
                &mut next,
                &mut advance,
                *participant_id,
                *initiative,
                *dexterity,
            ),
            CombatAction::DelayAction { participant_id } => {
                delay_action(&mut next, &mut advance, *participant_id)
            }
            CombatAction::ResumeDelayed { participant_id } => {
                resume_delayed(&mut next, *participant_id)
            }
            CombatAction::ReadyAction {
                participant_id,
                description,
            } => ready_action(&mut next, *participant_id, description),
            CombatAction::ResolveReadyAction { participant_id } => {
                resolve_ready_action(&mut next, *participant_id)
            }
            CombatAction::ApplyDamage {
                participant_id,
                amount,
            } => change_hit_points(&mut next, *participant_id, |hp| {
                Ok((hp.apply_damage(*amount)?, format!("took {amount} damage")))
            }),
            CombatAction::ApplyHealing {
                participant_id,
                amount,
            } => change_hit_points(&mut next, *participant_id, |hp| {
                Ok((hp.apply_healing(*amount)?, format!("healed {amount}")))
            }),
            CombatAction::SetTemporaryHp {
                participant_id,
                amount,
            } => change_hit_points(&mut next, *participant_id, |hp| {
                Ok((
                    hp.set_temporary(*amount)?,
                    format!("was granted {amount} temporary hit points"),
                ))
            }),
            CombatAction::SetMaxHp {
                participant_id,
                max_hit_points,
            } => change_hit_points(&mut next, *participant_id, |hp| {
                Ok((
                    hp.set_maximum(*max_hit_points)?,
                    format!("now has {max_hit_points} maximum hit points"),
                ))
            }),
            CombatAction::SetCurrentHp {
                participant_id,
                current_hit_points,
            } => change_hit_points(&mut next, *participant_id, |hp| {
                let hp = hp.set_current(*current_hit_points);
                let summary = format!("set to {} hit points", hp.current);
                Ok((hp, summary))
            }),
            CombatAction::AddParticipant { combatant } => {
                add_participant(&mut next, &mut advance, combatant, rng)
            }
            CombatAction::RemoveParticipant { participant_id } => {
                remove_participant(&mut next, &mut advance, *participant_id)
            }
            CombatAction::SetParticipantActive {
                participant_id,
                active,
            } => set_participant_active(&mut next, &mut advance, *participant_id, *active),
            CombatAction::AddEffect {
                effect_id,
                target_participant_id,
                name,
                remaining_rounds,
            } => add_effect(
                &mut next,
                *effect_id,
                *target_participant_id,
                name,
                *remaining_rounds,
            ),
            CombatAction::RemoveEffect { effect_id } => {
                let effect = next.effects.remove_effect(*effect_id)?;
                Ok((
                    Some(effect.target_participant_id),
                    format!("{} was removed", effect.name),
                ))
            }
            CombatAction::AddTrigger {
                trigger_id,
                activation_round,
                description,
            } => add_trigger(&mut next, *trigger_id, *activation_round, description),
            CombatAction::RemoveTrigger { trigger_id } => {
                let trigger = next.effects.remove_trigger(*trigger_id)?;
                Ok((None, format!("trigger cancelled: {}", trigger.description)))
            }
        }?;

        let record = ActionRecord {
            round,
            turn,
            participant_id,
            action: action.action_type().to_owned(),
            description,
            at: now,
        };
        next.action_history.push(record.clone());
        next.last_action = Some(record);

        Ok(Transition {
            state: next,
            expired_effects: advance.expired,
            activated_triggers: advance.activated,
        })
    }
}

fn name_of(state: &CombatState, participant_id: Uuid) -> String {
    state
        .participant(participant_id)
        .map_or_else(|| participant_id.to_string(), |p| p.name.clone())
}

fn require_running(state: &CombatState) -> Result<(), TransitionError> {
    match state.phase {
        CombatPhase::Active => Ok(()),
        CombatPhase::Paused => Err(TransitionError::CombatPaused),
        CombatPhase::NotStarted | CombatPhase::Ended => Err(TransitionError::CombatNotActive),
    }
}

fn require_text(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText(field));
    }
    Ok(trimmed.to_owned())
}

fn holder(state: &CombatState) -> Holder {
    state
        .current_participant_id()
        .map(|id| (id, state.current_turn))
}

/// Starts a new round: resets `has_acted`, ticks effects and triggers, and
/// hands the turn to the first active entry.
fn wrap_round(state: &mut CombatState, advance: &mut RoundAdvance) -> Result<(), TransitionError> {
    let first = state
        .initiative_order
        .next_active_from(0)
        .ok_or(TransitionError::NoActiveParticipants)?;
    state.current_round += 1;
    state.initiative_order.reset_round();
    advance.extend(state.effects.on_round_advance(state.current_round));
    state.current_turn = first;
    Ok(())
}

/// Moves the turn to the first active entry at or after `start`, wrapping
/// into a new round when there is none.
fn advance_from(
    state: &mut CombatState,
    start: usize,
    advance: &mut RoundAdvance,
) -> Result<(), TransitionError> {
    match state.initiative_order.next_active_from(start) {
        Some(index) => {
            state.current_turn = index;
            Ok(())
        }
        None => wrap_round(state, advance),
    }
}

/// Points `current_turn` back at whoever held it before the order changed,
/// or at the next eligible entry if they are gone or inactive.
fn realign(
    state: &mut CombatState,
    previous: Holder,
    advance: &mut RoundAdvance,
) -> Result<(), TransitionError> {
    let Some((participant_id, old_index)) = previous else {
        return Ok(());
    };
    if !state.initiative_order.has_active() {
        state.current_turn = old_index.min(state.initiative_order.len().saturating_sub(1));
        return Ok(());
    }
    match state.initiative_order.position(participant_id) {
        Some(index) if state.initiative_order.get(index).is_some_and(|e| e.is_active) => {
            state.current_turn = index;
            Ok(())
        }
        Some(index) => advance_from(state, index + 1, advance),
        None => advance_from(state, old_index, advance),
    }
}

/// Appends the current turn to the history and returns its holder.
fn record_turn(state: &mut CombatState) -> Result<Uuid, TransitionError> {
    let participant_id = state
        .initiative_order
        .get(state.current_turn)
        .map(|e| e.participant_id)
        .ok_or(TransitionError::NoActiveParticipants)?;
    state.turn_history.push(TurnRecord {
        round: state.current_round,
        turn: state.current_turn,
        participant_id,
    });
    Ok(participant_id)
}

fn join(
    state: &mut CombatState,
    setup: &CombatantSetup,
    rng: &mut dyn DeterministicRng,
) -> Result<(), CombatError> {
    if state.participant(setup.participant_id).is_some() {
        return Err(ValidationError::DuplicateParticipant(setup.participant_id).into());
    }
    let name = require_text(&setup.name, "name")?;
    validate_dexterity(setup.dexterity)?;
    let hit_points = HitPoints::new(
        setup.current_hit_points.unwrap_or(setup.max_hit_points),
        setup.max_hit_points,
        setup.temporary_hit_points,
    )?;
    let initiative = match setup.initiative {
        Some(value) => value,
        None => roll_initiative(setup.dexterity, rng),
    };
    let entry = InitiativeEntry::new(setup.participant_id, initiative, setup.dexterity)?;

    state.participants.push(Participant {
        id: setup.participant_id,
        name,
        hit_points,
        armor_class: setup.armor_class,
        is_player: setup.is_player,
    });
    state.initiative_order.insert(entry);
    Ok(())
}

fn start(
    state: &mut CombatState,
    advance: &mut RoundAdvance,
    combatants: &[CombatantSetup],
    now: DateTime<Utc>,
    rng: &mut dyn DeterministicRng,
) -> Applied {
    if state.phase != CombatPhase::NotStarted {
        return Err(TransitionError::AlreadyStarted.into());
    }
    for setup in combatants {
        join(state, setup, rng)?;
    }
    if state.initiative_order.is_empty() {
        return Err(ValidationError::NoCombatants.into());
    }
    state.initiative_order.reset_round();
    let first = state
        .initiative_order
        .next_active_from(0)
        .ok_or(TransitionError::NoActiveParticipants)?;

    state.phase = CombatPhase::Active;
    state.current_round = 1;
    state.current_turn = first;
    state.start_time = Some(now);
    state.end_time = None;
    state.open_accrual_window(now);
    advance
        .activated
        .extend(state.effects.fire_triggers(state.current_round));

    Ok((
        None,
        format!(
            "combat started with {} combatants",
            state.initiative_order.len()
        ),
    ))
}

fn next_turn(state: &mut CombatState, advance: &mut RoundAdvance) -> Applied {
    require_running(state)?;
    if !state.initiative_order.has_active() {
        return Err(TransitionError::NoActiveParticipants.into());
    }
    let participant_id = record_turn(state)?;
    if let Some(entry) = state.initiative_order.entry_at_mut(state.current_turn) {
        entry.has_acted = true;
        entry.is_delayed = false;
    }
    advance_from(state, state.current_turn + 1, advance)?;
    Ok((
        Some(participant_id),
        format!("{} ended their turn", name_of(state, participant_id)),
    ))
}

/// Rewinds the turn pointer. Hit points, effects and triggers stay as they are.
fn previous_turn(state: &mut CombatState) -> Applied {
    let record = state
        .turn_history
        .pop()
        .ok_or(TransitionError::NoPreviousTurn)?;
    let crossed_round = record.round < state.current_round;
    state.current_round = record.round;
    state.current_turn = state
        .initiative_order
        .position(record.participant_id)
        .unwrap_or_else(|| {
            record
                .turn
                .min(state.initiative_order.len().saturating_sub(1))
        });
    let restored = state.current_turn;
    for index in 0..state.initiative_order.len() {
        let Some(entry) = state.initiative_order.entry_at_mut(index) else {
            continue;
        };
        if entry.participant_id == record.participant_id {
            entry.has_acted = false;
            entry.is_delayed = false;
        } else if crossed_round {
            // Back in the earlier round, everyone ahead of the restored turn
            // has gone, apart from entries still holding a delay.
            entry.has_acted = index < restored && entry.is_active && !entry.is_delayed;
        }
    }
    Ok((
        Some(record.participant_id),
        format!(
            "turn returned to {} in round {}",
            name_of(state, record.participant_id),
            record.round
        ),
    ))
}

fn pause(state: &mut CombatState, now: DateTime<Utc>) -> Applied {
    if state.phase != CombatPhase::Active {
        return Err(TransitionError::CombatNotActive.into());
    }
    state.close_accrual_window(now);
    state.phase = CombatPhase::Paused;
    Ok((None, "combat paused".to_owned()))
}

fn resume(state: &mut CombatState, now: DateTime<Utc>) -> Applied {
    if state.phase != CombatPhase::Paused {
        return Err(TransitionError::CombatNotPaused.into());
    }
    state.open_accrual_window(now);
    state.phase = CombatPhase::Active;
    Ok((None, "combat resumed".to_owned()))
}

fn end(state: &mut CombatState, now: DateTime<Utc>) -> Applied {
    if !state.is_active() {
        return Err(TransitionError::CombatNotActive.into());
    }
    state.close_accrual_window(now);
    state.phase = CombatPhase::Ended;
    state.end_time = Some(now);
    Ok((
        None,
        format!("combat ended after {} rounds", state.current_round),
    ))
}

fn update_initiative(
    state: &mut CombatState,
    advance: &mut RoundAdvance,
    participant_id: Uuid,
    initiative: i32,
    dexterity: i32,
) -> Applied {
    let previous = holder(state);
    state
        .initiative_order
        .update_entry(participant_id, initiative, dexterity)?;
    realign(state, previous, advance)?;
    Ok((
        Some(participant_id),
        format!(
            "{} moved to initiative {initiative}",
            name_of(state, participant_id)
        ),
    ))
}

fn delay_action(
    state: &mut CombatState,
    advance: &mut RoundAdvance,
    participant_id: Uuid,
) -> Applied {
    require_running(state)?;
    if state.initiative_order.entry(participant_id).is_none() {
        return Err(ValidationError::ParticipantNotFound(participant_id).into());
    }
    if state.current_participant_id() != Some(participant_id) {
        return Err(ValidationError::NotParticipantsTurn(participant_id).into());
    }
    record_turn(state)?;
    state.initiative_order.entry_mut(participant_id)?.is_delayed = true;
    advance_from(state, state.current_turn + 1, advance)?;
    Ok((
        Some(participant_id),
        format!("{} delayed their turn", name_of(state, participant_id)),
    ))
}

/// Re-inserts a delayed participant directly before the current turn holder
/// and gives them the turn. They adopt the holder's initiative and dexterity;
/// equal keys keep their relative order under the stable sort, so a later
/// re-sort leaves them ahead of the holder.
fn resume_delayed(state: &mut CombatState, participant_id: Uuid) -> Applied {
    require_running(state)?;
    let from = state
        .initiative_order
        .position(participant_id)
        .ok_or(ValidationError::ParticipantNotFound(participant_id))?;
    let entry = state.initiative_order.entry_mut(participant_id)?;
    if !entry.is_delayed {
        return Err(ValidationError::NotDelayed(participant_id).into());
    }
    if !entry.is_active {
        return Err(TransitionError::ParticipantUnavailable.into());
    }

    let current = state.current_turn;
    if from != current {
        let holder_key = state
            .initiative_order
            .get(current)
            .map(|e| (e.initiative, e.dexterity));
        let target = if from < current { current - 1 } else { current };
        state.initiative_order.move_to(from, target);
        state.current_turn = target;
        let entry = state.initiative_order.entry_mut(participant_id)?;
        if let Some((initiative, dexterity)) = holder_key {
            entry.initiative = initiative;
            entry.dexterity = dexterity;
        }
    }
    state.initiative_order.entry_mut(participant_id)?.is_delayed = false;

    Ok((
        Some(participant_id),
        format!("{} acts from delay", name_of(state, participant_id)),
    ))
}

fn ready_action(state: &mut CombatState, participant_id: Uuid, description: &str) -> Applied {
    require_running(state)?;
    let description = require_text(description, "description")?;
    let entry = state.initiative_order.entry_mut(participant_id)?;
    if !entry.is_active || entry.has_acted {
        return Err(TransitionError::ParticipantUnavailable.into());
    }
    entry.ready_action = Some(description.clone());
    Ok((
        Some(participant_id),
        format!("{} readied: {description}", name_of(state, participant_id)),
    ))
}

fn resolve_ready_action(state: &mut CombatState, participant_id: Uuid) -> Applied {
    require_running(state)?;
    let readied = state
        .initiative_order
        .entry_mut(participant_id)?
        .ready_action
        .take()
        .ok_or(ValidationError::NoReadyAction(participant_id))?;
    Ok((
        Some(participant_id),
        format!(
            "{}'s readied action fires: {readied}",
            name_of(state, participant_id)
        ),
    ))
}

fn change_hit_points<F>(state: &mut CombatState, participant_id: Uuid, change: F) -> Applied
where
    F: FnOnce(HitPoints) -> Result<(HitPoints, String), ValidationError>,
{
    let participant = state.participant_mut(participant_id)?;
    let (hit_points, summary) = change(participant.hit_points)?;
    participant.hit_points = hit_points;
    Ok((
        Some(participant_id),
        format!(
            "{} {summary} ({}/{} hp, {} temporary)",
            participant.name, hit_points.current, hit_points.maximum, hit_points.temporary
        ),
    ))
}

fn add_participant(
    state: &mut CombatState,
    advance: &mut RoundAdvance,
    setup: &CombatantSetup,
    rng: &mut dyn DeterministicRng,
) -> Applied {
    let previous = holder(state);
    join(state, setup, rng)?;
    realign(state, previous, advance)?;
    Ok((
        Some(setup.participant_id),
        format!("{} joined the encounter", name_of(state, setup.participant_id)),
    ))
}

fn remove_participant(
    state: &mut CombatState,
    advance: &mut RoundAdvance,
    participant_id: Uuid,
) -> Applied {
    let name = state
        .participant(participant_id)
        .map(|p| p.name.clone())
        .ok_or(ValidationError::ParticipantNotFound(participant_id))?;
    let previous = holder(state);
    state.initiative_order.remove(participant_id);
    state.participants.retain(|p| p.id != participant_id);
    state.effects.remove_effects_for(participant_id);
    realign(state, previous, advance)?;
    Ok((Some(participant_id), format!("{name} left the encounter")))
}

fn set_participant_active(
    state: &mut CombatState,
    advance: &mut RoundAdvance,
    participant_id: Uuid,
    active: bool,
) -> Applied {
    let previous = holder(state);
    state.initiative_order.entry_mut(participant_id)?.is_active = active;
    realign(state, previous, advance)?;
    let verb = if active { "rejoined" } else { "dropped out of" };
    Ok((
        Some(participant_id),
        format!("{} {verb} the initiative order", name_of(state, participant_id)),
    ))
}

fn add_effect(
    state: &mut CombatState,
    effect_id: Uuid,
    target_participant_id: Uuid,
    name: &str,
    remaining_rounds: u32,
) -> Applied {
    if state.participant(target_participant_id).is_none() {
        return Err(ValidationError::ParticipantNotFound(target_participant_id).into());
    }
    let name = require_text(name, "name")?;
    let description = format!(
        "{name} applied to {} for {remaining_rounds} rounds",
        name_of(state, target_participant_id)
    );
    state.effects.add_effect(Effect {
        id: effect_id,
        target_participant_id,
        remaining_rounds,
        name,
    });
    Ok((Some(target_participant_id), description))
}

fn add_trigger(
    state: &mut CombatState,
    trigger_id: Uuid,
    activation_round: u32,
    description: &str,
) -> Applied {
    let description = require_text(description, "description")?;
    if activation_round <= state.current_round {
        return Err(ValidationError::TriggerRoundPassed {
            activation_round,
            current_round: state.current_round,
        }
        .into());
    }
    let summary = format!("round {activation_round}: {description}");
    state.effects.add_trigger(Trigger {
        id: trigger_id,
        activation_round,
        description,
        fired: false,
    });
    Ok((None, format!("trigger scheduled for {summary}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use chrono::{Duration, TimeZone};
    use skirmish_test_support::{MockRng, SequenceRng};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn setup(name: &str, initiative: i32, dexterity: i32) -> CombatantSetup {
        CombatantSetup {
            participant_id: Uuid::new_v4(),
            name: name.to_owned(),
            max_hit_points: 100,
            current_hit_points: None,
            temporary_hit_points: 0,
            armor_class: 14,
            is_player: true,
            initiative: Some(initiative),
            dexterity,
        }
    }

    fn apply(state: &CombatState, action: CombatAction) -> Result<Transition, CombatError> {
        TurnEngine::new().apply(state, &action, t0(), &mut MockRng)
    }

    fn apply_ok(state: &CombatState, action: CombatAction) -> CombatState {
        apply(state, action).unwrap().state
    }

    /// Started combat with A (20), B (15), C (10); A holds the turn.
    fn started() -> (CombatState, [Uuid; 3]) {
        let a = setup("Aria", 20, 12);
        let b = setup("Bram", 15, 12);
        let c = setup("Cole", 10, 12);
        let ids = [a.participant_id, b.participant_id, c.participant_id];
        let state = apply_ok(
            &CombatState::new(),
            CombatAction::Start {
                combatants: vec![c, a, b],
            },
        );
        (state, ids)
    }

    fn current(state: &CombatState) -> Uuid {
        state.current_participant_id().unwrap()
    }

    fn transition_err(result: Result<Transition, CombatError>) -> TransitionError {
        match result {
            Err(CombatError::IllegalTransition(err)) => err,
            other => panic!("expected IllegalTransition, got {other:?}"),
        }
    }

    fn validation_err(result: Result<Transition, CombatError>) -> ValidationError {
        match result {
            Err(CombatError::Validation(err)) => err,
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    // --- start ---

    #[test]
    fn test_start_sorts_order_and_opens_round_one() {
        let (state, [a, b, c]) = started();

        let order: Vec<Uuid> = state
            .initiative_order
            .entries()
            .iter()
            .map(|e| e.participant_id)
            .collect();
        assert_eq!(order, vec![a, b, c]);
        assert_eq!(state.phase, CombatPhase::Active);
        assert_eq!(state.current_round, 1);
        assert_eq!(state.current_turn, 0);
        assert_eq!(state.start_time, Some(t0()));
        assert_eq!(state.active_since, Some(t0()));
    }

    #[test]
    fn test_start_twice_is_rejected_and_state_unchanged() {
        let (state, _) = started();
        let before = state.clone();

        let err = transition_err(apply(
            &state,
            CombatAction::Start {
                combatants: vec![setup("Dax", 12, 10)],
            },
        ));

        assert_eq!(err, TransitionError::AlreadyStarted);
        assert_eq!(state, before);
    }

    #[test]
    fn test_start_without_combatants_is_rejected() {
        let err = validation_err(apply(
            &CombatState::new(),
            CombatAction::Start { combatants: vec![] },
        ));

        assert_eq!(err, ValidationError::NoCombatants);
    }

    #[test]
    fn test_start_rejects_duplicate_participants() {
        let a = setup("Aria", 20, 12);
        let duplicate = a.clone();

        let err = validation_err(apply(
            &CombatState::new(),
            CombatAction::Start {
                combatants: vec![a.clone(), duplicate],
            },
        ));

        assert_eq!(err, ValidationError::DuplicateParticipant(a.participant_id));
    }

    #[test]
    fn test_start_rolls_missing_initiative() {
        let mut rolled = setup("Rook", 1, 14);
        rolled.initiative = None;
        let mut rng = SequenceRng::new(vec![17]);

        let transition = TurnEngine::new()
            .apply(
                &CombatState::new(),
                &CombatAction::Start {
                    combatants: vec![rolled.clone()],
                },
                t0(),
                &mut rng,
            )
            .unwrap();

        let entry = transition
            .state
            .initiative_order
            .entry(rolled.participant_id)
            .unwrap();
        assert_eq!(entry.initiative, 19);
    }

    #[test]
    fn test_start_includes_staged_participants() {
        let staged = setup("Scout", 25, 16);
        let state = apply_ok(
            &CombatState::new(),
            CombatAction::AddParticipant {
                combatant: staged.clone(),
            },
        );
        assert_eq!(state.phase, CombatPhase::NotStarted);

        let state = apply_ok(
            &state,
            CombatAction::Start {
                combatants: vec![setup("Bram", 15, 12)],
            },
        );

        assert_eq!(state.initiative_order.len(), 2);
        assert_eq!(current(&state), staged.participant_id);
    }

    // --- next_turn ---

    #[test]
    fn test_next_turn_marks_acted_and_records_history() {
        let (state, [a, b, _]) = started();

        let state = apply_ok(&state, CombatAction::NextTurn);

        assert_eq!(current(&state), b);
        assert!(state.initiative_order.entry(a).unwrap().has_acted);
        assert_eq!(
            state.turn_history,
            vec![TurnRecord {
                round: 1,
                turn: 0,
                participant_id: a
            }]
        );
    }

    #[test]
    fn test_next_turn_past_last_entry_starts_new_round() {
        let (mut state, [a, _, _]) = started();
        for _ in 0..2 {
            state = apply_ok(&state, CombatAction::NextTurn);
        }
        assert_eq!(state.current_round, 1);

        let state = apply_ok(&state, CombatAction::NextTurn);

        assert_eq!(state.current_round, 2);
        assert_eq!(current(&state), a);
        assert!(
            state
                .initiative_order
                .entries()
                .iter()
                .all(|e| !e.has_acted)
        );
    }

    #[test]
    fn test_next_turn_skips_inactive_entries() {
        let (state, [_, b, c]) = started();
        let state = apply_ok(
            &state,
            CombatAction::SetParticipantActive {
                participant_id: b,
                active: false,
            },
        );

        let state = apply_ok(&state, CombatAction::NextTurn);

        assert_eq!(current(&state), c);
    }

    #[test]
    fn test_next_turn_does_not_skip_delayed_entries() {
        let (state, [a, b, _]) = started();
        let state = apply_ok(&state, CombatAction::DelayAction { participant_id: a });
        let state = apply_ok(&state, CombatAction::NextTurn);
        let state = apply_ok(&state, CombatAction::NextTurn);
        assert_eq!(state.current_round, 2);

        assert_eq!(current(&state), a);
        assert!(state.initiative_order.entry(a).unwrap().is_delayed);
        assert!(state.initiative_order.entry(b).is_some());
    }

    #[test]
    fn test_next_turn_requires_running_combat() {
        let (state, _) = started();
        let paused = apply_ok(&state, CombatAction::Pause);

        assert_eq!(
            transition_err(apply(&CombatState::new(), CombatAction::NextTurn)),
            TransitionError::CombatNotActive
        );
        assert_eq!(
            transition_err(apply(&paused, CombatAction::NextTurn)),
            TransitionError::CombatPaused
        );
    }

    #[test]
    fn test_round_boundary_reports_expired_effects_and_fired_triggers() {
        let (state, [a, b, _]) = started();
        let short = Uuid::new_v4();
        let long = Uuid::new_v4();
        let now = Uuid::new_v4();
        let later = Uuid::new_v4();
        let mut state = state;
        for action in [
            CombatAction::AddEffect {
                effect_id: short,
                target_participant_id: a,
                name: "Bless".to_owned(),
                remaining_rounds: 1,
            },
            CombatAction::AddEffect {
                effect_id: long,
                target_participant_id: b,
                name: "Haste".to_owned(),
                remaining_rounds: 3,
            },
            CombatAction::AddTrigger {
                trigger_id: now,
                activation_round: 2,
                description: "the bridge collapses".to_owned(),
            },
            CombatAction::AddTrigger {
                trigger_id: later,
                activation_round: 4,
                description: "reinforcements arrive".to_owned(),
            },
            CombatAction::NextTurn,
            CombatAction::NextTurn,
        ] {
            state = apply_ok(&state, action);
        }

        let transition = apply(&state, CombatAction::NextTurn).unwrap();

        assert_eq!(transition.expired_effects, vec![short]);
        assert_eq!(transition.activated_triggers, vec![now]);
        assert_eq!(transition.state.effects.effects().len(), 1);
        assert_eq!(transition.state.effects.triggers().len(), 2);
    }

    #[test]
    fn test_next_turn_with_everyone_inactive_is_rejected() {
        let (mut state, ids) = started();
        for id in ids {
            state = apply_ok(
                &state,
                CombatAction::SetParticipantActive {
                    participant_id: id,
                    active: false,
                },
            );
        }

        assert_eq!(
            transition_err(apply(&state, CombatAction::NextTurn)),
            TransitionError::NoActiveParticipants
        );
    }

    // --- previous_turn ---

    #[test]
    fn test_previous_turn_with_empty_history_is_rejected() {
        let (state, _) = started();

        assert_eq!(
            transition_err(apply(&state, CombatAction::PreviousTurn)),
            TransitionError::NoPreviousTurn
        );
    }

    #[test]
    fn test_previous_turn_rewinds_across_round_boundary() {
        let (mut state, [_, _, c]) = started();
        for _ in 0..3 {
            state = apply_ok(&state, CombatAction::NextTurn);
        }
        assert_eq!(state.current_round, 2);

        let state = apply_ok(&state, CombatAction::PreviousTurn);

        assert_eq!(state.current_round, 1);
        assert_eq!(current(&state), c);
        assert!(!state.initiative_order.entry(c).unwrap().has_acted);
        assert_eq!(state.turn_history.len(), 2);
    }

    #[test]
    fn test_previous_turn_across_round_boundary_restores_who_has_acted() {
        let (mut state, [a, b, c]) = started();
        for _ in 0..3 {
            state = apply_ok(&state, CombatAction::NextTurn);
        }

        let state = apply_ok(&state, CombatAction::PreviousTurn);

        let acted: Vec<bool> = [a, b, c]
            .iter()
            .map(|id| state.initiative_order.entry(*id).unwrap().has_acted)
            .collect();
        assert_eq!(acted, vec![true, true, false]);
        assert_eq!(
            transition_err(apply(
                &state,
                CombatAction::ReadyAction {
                    participant_id: a,
                    description: "dodge".to_owned(),
                }
            )),
            TransitionError::ParticipantUnavailable
        );
    }

    #[test]
    fn test_previous_turn_undoes_a_delay() {
        let (state, [a, b, _]) = started();
        let state = apply_ok(&state, CombatAction::DelayAction { participant_id: a });
        assert_eq!(current(&state), b);

        let state = apply_ok(&state, CombatAction::PreviousTurn);

        assert_eq!(current(&state), a);
        let entry = state.initiative_order.entry(a).unwrap();
        assert!(!entry.is_delayed);
        assert!(!entry.has_acted);
    }

    #[test]
    fn test_previous_turn_does_not_revert_hit_points() {
        let (state, [a, b, _]) = started();
        let state = apply_ok(&state, CombatAction::NextTurn);
        let state = apply_ok(
            &state,
            CombatAction::ApplyDamage {
                participant_id: a,
                amount: 12,
            },
        );
        assert_eq!(current(&state), b);

        let state = apply_ok(&state, CombatAction::PreviousTurn);

        assert_eq!(current(&state), a);
        assert_eq!(state.participant(a).unwrap().hit_points.current, 88);
    }

    // --- pause / resume / end ---

    #[test]
    fn test_pause_and_resume_accrue_only_active_time() {
        let (state, _) = started();
        let engine = TurnEngine::new();
        let mut rng = MockRng;

        let paused = engine
            .apply(&state, &CombatAction::Pause, t0() + Duration::seconds(30), &mut rng)
            .unwrap()
            .state;
        let resumed = engine
            .apply(&paused, &CombatAction::Resume, t0() + Duration::seconds(90), &mut rng)
            .unwrap()
            .state;
        let ended = engine
            .apply(&resumed, &CombatAction::End, t0() + Duration::seconds(100), &mut rng)
            .unwrap()
            .state;

        assert_eq!(paused.total_duration_ms, 30_000);
        assert_eq!(resumed.active_since, Some(t0() + Duration::seconds(90)));
        assert_eq!(ended.total_duration_ms, 40_000);
        assert_eq!(ended.end_time, Some(t0() + Duration::seconds(100)));
        assert_eq!(ended.phase, CombatPhase::Ended);
    }

    #[test]
    fn test_pause_twice_and_resume_while_active_are_rejected() {
        let (state, _) = started();
        let paused = apply_ok(&state, CombatAction::Pause);

        assert_eq!(
            transition_err(apply(&paused, CombatAction::Pause)),
            TransitionError::CombatNotActive
        );
        assert_eq!(
            transition_err(apply(&state, CombatAction::Resume)),
            TransitionError::CombatNotPaused
        );
    }

    #[test]
    fn test_end_from_paused_and_then_everything_is_rejected() {
        let (state, [a, _, _]) = started();
        let paused = apply_ok(&state, CombatAction::Pause);
        let ended = apply_ok(&paused, CombatAction::End);

        for action in [
            CombatAction::NextTurn,
            CombatAction::Resume,
            CombatAction::ApplyHealing {
                participant_id: a,
                amount: 5,
            },
            CombatAction::Start { combatants: vec![] },
        ] {
            assert_eq!(
                transition_err(apply(&ended, action)),
                TransitionError::CombatAlreadyEnded
            );
        }
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        assert_eq!(
            transition_err(apply(&CombatState::new(), CombatAction::End)),
            TransitionError::CombatNotActive
        );
    }

    // --- delay / ready ---

    #[test]
    fn test_delay_action_advances_without_marking_acted() {
        let (state, [a, b, _]) = started();

        let state = apply_ok(&state, CombatAction::DelayAction { participant_id: a });

        let entry = state.initiative_order.entry(a).unwrap();
        assert!(entry.is_delayed);
        assert!(!entry.has_acted);
        assert_eq!(current(&state), b);
        assert_eq!(state.turn_history.len(), 1);
    }

    #[test]
    fn test_delay_action_out_of_turn_is_rejected() {
        let (state, [_, b, _]) = started();

        assert_eq!(
            validation_err(apply(&state, CombatAction::DelayAction { participant_id: b })),
            ValidationError::NotParticipantsTurn(b)
        );
    }

    #[test]
    fn test_resume_delayed_takes_the_turn_before_current_holder() {
        let (state, [a, b, c]) = started();
        let state = apply_ok(&state, CombatAction::DelayAction { participant_id: a });
        let state = apply_ok(&state, CombatAction::NextTurn);
        assert_eq!(current(&state), c);

        let state = apply_ok(&state, CombatAction::ResumeDelayed { participant_id: a });

        assert_eq!(current(&state), a);
        let order: Vec<Uuid> = state
            .initiative_order
            .entries()
            .iter()
            .map(|e| e.participant_id)
            .collect();
        assert_eq!(order, vec![b, a, c]);
        assert!(!state.initiative_order.entry(a).unwrap().is_delayed);

        let state = apply_ok(&state, CombatAction::NextTurn);
        assert_eq!(current(&state), c);
    }

    #[test]
    fn test_resume_delayed_survives_a_later_re_sort() {
        let fast = setup("Aria", 20, 20);
        let slow = setup("Bram", 10, 10);
        let nimble = setup("Cole", 10, 15);
        let [a, b, c] = [fast.participant_id, slow.participant_id, nimble.participant_id];
        let state = apply_ok(
            &CombatState::new(),
            CombatAction::Start {
                combatants: vec![fast, slow, nimble],
            },
        );
        let state = apply_ok(&state, CombatAction::DelayAction { participant_id: a });
        let state = apply_ok(&state, CombatAction::NextTurn);
        assert_eq!(current(&state), b);
        let state = apply_ok(&state, CombatAction::ResumeDelayed { participant_id: a });
        let order = |state: &CombatState| -> Vec<Uuid> {
            state
                .initiative_order
                .entries()
                .iter()
                .map(|e| e.participant_id)
                .collect()
        };
        assert_eq!(order(&state), vec![c, a, b]);

        let mut resorted = state.initiative_order.clone();
        resorted.sort();
        assert_eq!(resorted, state.initiative_order);
        let state = apply_ok(
            &state,
            CombatAction::AddParticipant {
                combatant: setup("Dax", 5, 10),
            },
        );

        assert_eq!(order(&state)[..3], [c, a, b]);
        assert_eq!(current(&state), a);
        let state = apply_ok(&state, CombatAction::NextTurn);
        assert_eq!(current(&state), b);
    }

    #[test]
    fn test_resume_delayed_requires_delay() {
        let (state, [_, b, _]) = started();

        assert_eq!(
            validation_err(apply(&state, CombatAction::ResumeDelayed { participant_id: b })),
            ValidationError::NotDelayed(b)
        );
    }

    #[test]
    fn test_ready_action_keeps_the_turn() {
        let (state, [a, b, _]) = started();

        let state = apply_ok(
            &state,
            CombatAction::ReadyAction {
                participant_id: b,
                description: "shoot the first goblin through the door".to_owned(),
            },
        );

        assert_eq!(current(&state), a);
        assert_eq!(
            state.initiative_order.entry(b).unwrap().ready_action.as_deref(),
            Some("shoot the first goblin through the door")
        );
    }

    #[test]
    fn test_ready_action_rejections() {
        let (state, [a, _, _]) = started();
        let unknown = Uuid::new_v4();
        let acted = apply_ok(&state, CombatAction::NextTurn);

        assert_eq!(
            validation_err(apply(
                &state,
                CombatAction::ReadyAction {
                    participant_id: unknown,
                    description: "dodge".to_owned(),
                }
            )),
            ValidationError::ParticipantNotFound(unknown)
        );
        assert_eq!(
            transition_err(apply(
                &CombatState::new(),
                CombatAction::ReadyAction {
                    participant_id: a,
                    description: "dodge".to_owned(),
                }
            )),
            TransitionError::CombatNotActive
        );
        assert_eq!(
            transition_err(apply(
                &acted,
                CombatAction::ReadyAction {
                    participant_id: a,
                    description: "dodge".to_owned(),
                }
            )),
            TransitionError::ParticipantUnavailable
        );
    }

    #[test]
    fn test_resolve_ready_action_clears_it() {
        let (state, [_, b, _]) = started();
        let state = apply_ok(
            &state,
            CombatAction::ReadyAction {
                participant_id: b,
                description: "cast shield".to_owned(),
            },
        );

        let state = apply_ok(&state, CombatAction::ResolveReadyAction { participant_id: b });

        assert_eq!(state.initiative_order.entry(b).unwrap().ready_action, None);
        assert_eq!(
            validation_err(apply(&state, CombatAction::ResolveReadyAction { participant_id: b })),
            ValidationError::NoReadyAction(b)
        );
    }

    // --- initiative changes ---

    #[test]
    fn test_update_initiative_keeps_turn_with_same_participant() {
        let (state, [a, b, c]) = started();
        let state = apply_ok(&state, CombatAction::NextTurn);
        assert_eq!(current(&state), b);

        let state = apply_ok(
            &state,
            CombatAction::UpdateInitiative {
                participant_id: c,
                initiative: 25,
                dexterity: 12,
            },
        );

        assert_eq!(state.initiative_order.position(c), Some(0));
        assert_eq!(state.initiative_order.position(a), Some(1));
        assert_eq!(current(&state), b);
        assert_eq!(state.current_turn, 2);
    }

    #[test]
    fn test_update_initiative_rejects_out_of_range() {
        let (state, [a, _, _]) = started();

        let err = validation_err(apply(
            &state,
            CombatAction::UpdateInitiative {
                participant_id: a,
                initiative: 0,
                dexterity: 12,
            },
        ));

        assert!(matches!(err, ValidationError::InitiativeOutOfRange { value: 0, .. }));
    }

    #[test]
    fn test_removing_current_holder_passes_turn_to_next() {
        let (state, [_, b, c]) = started();
        let state = apply_ok(&state, CombatAction::NextTurn);

        let state = apply_ok(&state, CombatAction::RemoveParticipant { participant_id: b });

        assert_eq!(current(&state), c);
        assert!(state.participant(b).is_none());
        assert_eq!(state.current_round, 1);
    }

    #[test]
    fn test_removing_last_holder_wraps_into_next_round() {
        let (mut state, [a, _, c]) = started();
        for _ in 0..2 {
            state = apply_ok(&state, CombatAction::NextTurn);
        }
        assert_eq!(current(&state), c);

        let state = apply_ok(&state, CombatAction::RemoveParticipant { participant_id: c });

        assert_eq!(state.current_round, 2);
        assert_eq!(current(&state), a);
    }

    #[test]
    fn test_deactivating_current_holder_passes_turn_to_next() {
        let (state, [a, b, c]) = started();
        let state = apply_ok(&state, CombatAction::NextTurn);
        assert_eq!(current(&state), b);

        let state = apply_ok(
            &state,
            CombatAction::SetParticipantActive {
                participant_id: b,
                active: false,
            },
        );

        assert_eq!(current(&state), c);
        assert_eq!(state.current_round, 1);
        assert!(state.initiative_order.entry(a).unwrap().has_acted);
    }

    #[test]
    fn test_deactivating_last_holder_wraps_into_next_round() {
        let (mut state, [a, _, c]) = started();
        for _ in 0..2 {
            state = apply_ok(&state, CombatAction::NextTurn);
        }
        assert_eq!(current(&state), c);

        let transition = apply(
            &state,
            CombatAction::SetParticipantActive {
                participant_id: c,
                active: false,
            },
        )
        .unwrap();

        assert_eq!(transition.state.current_round, 2);
        assert_eq!(current(&transition.state), a);
        assert!(
            transition
                .state
                .initiative_order
                .entries()
                .iter()
                .all(|e| !e.has_acted)
        );
    }

    #[test]
    fn test_removing_participant_drops_their_effects() {
        let (state, [_, b, _]) = started();
        let state = apply_ok(
            &state,
            CombatAction::AddEffect {
                effect_id: Uuid::new_v4(),
                target_participant_id: b,
                name: "Poisoned".to_owned(),
                remaining_rounds: 3,
            },
        );

        let state = apply_ok(&state, CombatAction::RemoveParticipant { participant_id: b });

        assert!(state.effects.effects().is_empty());
    }

    // --- hit points ---

    #[test]
    fn test_damage_goes_through_temporary_hit_points() {
        let (state, [a, _, _]) = started();
        let state = apply_ok(
            &state,
            CombatAction::SetCurrentHp {
                participant_id: a,
                current_hit_points: 75,
            },
        );
        let state = apply_ok(
            &state,
            CombatAction::SetTemporaryHp {
                participant_id: a,
                amount: 5,
            },
        );

        let state = apply_ok(
            &state,
            CombatAction::ApplyDamage {
                participant_id: a,
                amount: 10,
            },
        );

        let hp = state.participant(a).unwrap().hit_points;
        assert_eq!((hp.current, hp.temporary), (70, 0));
    }

    #[test]
    fn test_negative_damage_is_rejected_without_mutation() {
        let (state, [a, _, _]) = started();
        let before = state.clone();

        let err = validation_err(apply(
            &state,
            CombatAction::ApplyDamage {
                participant_id: a,
                amount: -3,
            },
        ));

        assert_eq!(err, ValidationError::NegativeAmount(-3));
        assert_eq!(state, before);
    }

    #[test]
    fn test_damage_to_unknown_participant_is_not_found() {
        let (state, _) = started();

        let err = apply(
            &state,
            CombatAction::ApplyDamage {
                participant_id: Uuid::new_v4(),
                amount: 3,
            },
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_hit_points_can_change_while_paused() {
        let (state, [a, _, _]) = started();
        let paused = apply_ok(&state, CombatAction::Pause);

        let state = apply_ok(
            &paused,
            CombatAction::ApplyHealing {
                participant_id: a,
                amount: 10,
            },
        );

        assert_eq!(state.participant(a).unwrap().hit_points.current, 100);
    }

    // --- effects and history ---

    #[test]
    fn test_trigger_can_be_staged_before_combat() {
        let trigger_id = Uuid::new_v4();

        let state = apply_ok(
            &CombatState::new(),
            CombatAction::AddTrigger {
                trigger_id,
                activation_round: 1,
                description: "ambush".to_owned(),
            },
        );

        assert_eq!(state.phase, CombatPhase::NotStarted);
        assert_eq!(state.effects.triggers()[0].id, trigger_id);
    }

    #[test]
    fn test_start_fires_triggers_scheduled_for_round_one() {
        let opening = Uuid::new_v4();
        let later = Uuid::new_v4();
        let mut state = CombatState::new();
        for (trigger_id, activation_round) in [(opening, 1), (later, 2)] {
            state = apply_ok(
                &state,
                CombatAction::AddTrigger {
                    trigger_id,
                    activation_round,
                    description: "ambush".to_owned(),
                },
            );
        }
        let effect_holder = setup("Aria", 20, 12);
        let state = apply_ok(
            &state,
            CombatAction::AddParticipant {
                combatant: effect_holder.clone(),
            },
        );
        let state = apply_ok(
            &state,
            CombatAction::AddEffect {
                effect_id: Uuid::new_v4(),
                target_participant_id: effect_holder.participant_id,
                name: "Bless".to_owned(),
                remaining_rounds: 1,
            },
        );

        let transition = apply(&state, CombatAction::Start { combatants: vec![] }).unwrap();

        assert_eq!(transition.activated_triggers, vec![opening]);
        assert!(transition.expired_effects.is_empty());
        assert_eq!(transition.state.effects.effects()[0].remaining_rounds, 1);
        let fired: Vec<(Uuid, bool)> = transition
            .state
            .effects
            .triggers()
            .iter()
            .map(|t| (t.id, t.fired))
            .collect();
        assert_eq!(fired, vec![(opening, true), (later, false)]);

        let next_round = apply(&transition.state, CombatAction::NextTurn).unwrap();
        assert_eq!(next_round.state.current_round, 2);
        assert_eq!(next_round.activated_triggers, vec![later]);
    }

    #[test]
    fn test_trigger_for_current_round_is_rejected() {
        let (state, _) = started();

        let err = validation_err(apply(
            &state,
            CombatAction::AddTrigger {
                trigger_id: Uuid::new_v4(),
                activation_round: 1,
                description: "too late".to_owned(),
            },
        ));

        assert_eq!(
            err,
            ValidationError::TriggerRoundPassed {
                activation_round: 1,
                current_round: 1
            }
        );
    }

    #[test]
    fn test_every_applied_action_is_recorded() {
        let (state, [a, _, _]) = started();

        let state = apply_ok(&state, CombatAction::NextTurn);

        assert_eq!(state.action_history.len(), 2);
        let last = state.last_action.unwrap();
        assert_eq!(last.action, "combat.next_turn");
        assert_eq!(last.participant_id, Some(a));
        assert_eq!(last.description, "Aria ended their turn");
        assert_eq!(last.round, 1);
    }
}
