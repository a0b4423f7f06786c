//! Routes for combat encounters.
//!
//! One POST per command under `/{encounter_id}/<command>`. Every body may
//! carry `expected_version`; when present, the command is rejected with 409
//! unless it matches the stored version.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use skirmish_combat::application::command_handlers::{self, CommandOutcome};
use skirmish_combat::application::query_handlers::{self, EncounterView};
use skirmish_combat::domain::commands::{CombatAction, CombatantSetup, EncounterCommand};
use skirmish_core::clock::Clock;
use skirmish_core::command::Command;

use crate::error::ApiError;
use crate::state::AppState;

fn default_armor_class() -> i32 {
    10
}

fn default_dexterity() -> i32 {
    10
}

/// A combatant in a request body.
#[derive(Debug, Deserialize)]
pub struct CombatantRequest {
    /// Participant id; generated when omitted.
    #[serde(default)]
    pub participant_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Maximum hit points.
    pub max_hit_points: i32,
    /// Starting hit points; defaults to the maximum.
    #[serde(default)]
    pub current_hit_points: Option<i32>,
    /// Starting temporary hit points.
    #[serde(default)]
    pub temporary_hit_points: i32,
    /// Armor class.
    #[serde(default = "default_armor_class")]
    pub armor_class: i32,
    /// Controlled by a player.
    #[serde(default)]
    pub is_player: bool,
    /// Initiative total; rolled when omitted.
    #[serde(default)]
    pub initiative: Option<i32>,
    /// Dexterity score.
    #[serde(default = "default_dexterity")]
    pub dexterity: i32,
}

impl From<CombatantRequest> for CombatantSetup {
    fn from(request: CombatantRequest) -> Self {
        Self {
            participant_id: request.participant_id.unwrap_or_else(Uuid::now_v7),
            name: request.name,
            max_hit_points: request.max_hit_points,
            current_hit_points: request.current_hit_points,
            temporary_hit_points: request.temporary_hit_points,
            armor_class: request.armor_class,
            is_player: request.is_player,
            initiative: request.initiative,
            dexterity: request.dexterity,
        }
    }
}

/// Request body for commands with no arguments.
#[derive(Debug, Default, Deserialize)]
pub struct VersionedRequest {
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/start.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    /// Combatants joining at the start.
    #[serde(default)]
    pub combatants: Vec<CombatantRequest>,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/add-participant.
#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    /// The new combatant.
    pub combatant: CombatantRequest,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for commands that name one participant.
#[derive(Debug, Deserialize)]
pub struct ParticipantRequest {
    /// The participant.
    pub participant_id: Uuid,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/update-initiative.
#[derive(Debug, Deserialize)]
pub struct UpdateInitiativeRequest {
    /// Whose entry to change.
    pub participant_id: Uuid,
    /// New initiative total.
    pub initiative: i32,
    /// New dexterity score.
    pub dexterity: i32,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/ready-action.
#[derive(Debug, Deserialize)]
pub struct ReadyActionRequest {
    /// Who readies.
    pub participant_id: Uuid,
    /// What they ready.
    pub description: String,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for damage, healing and temporary hit points.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    /// Target.
    pub participant_id: Uuid,
    /// Non-negative amount.
    pub amount: i32,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/set-max-hp.
#[derive(Debug, Deserialize)]
pub struct SetMaxHpRequest {
    /// Target.
    pub participant_id: Uuid,
    /// New maximum.
    pub max_hit_points: i32,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/set-current-hp.
#[derive(Debug, Deserialize)]
pub struct SetCurrentHpRequest {
    /// Target.
    pub participant_id: Uuid,
    /// New current hit points.
    pub current_hit_points: i32,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/set-participant-active.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    /// Whose entry.
    pub participant_id: Uuid,
    /// New eligibility.
    pub active: bool,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/add-effect.
#[derive(Debug, Deserialize)]
pub struct AddEffectRequest {
    /// Who the effect applies to.
    pub target_participant_id: Uuid,
    /// Display name.
    pub name: String,
    /// Rounds it lasts.
    pub remaining_rounds: u32,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/remove-effect.
#[derive(Debug, Deserialize)]
pub struct RemoveEffectRequest {
    /// Which effect.
    pub effect_id: Uuid,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/add-trigger.
#[derive(Debug, Deserialize)]
pub struct AddTriggerRequest {
    /// Round it fires at.
    pub activation_round: u32,
    /// What happens.
    pub description: String,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for POST /{encounter_id}/remove-trigger.
#[derive(Debug, Deserialize)]
pub struct RemoveTriggerRequest {
    /// Which trigger.
    pub trigger_id: Uuid,
    /// Version the caller last read.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// Stored version after the command.
    pub version: i64,
    /// Effects that expired at a round boundary this command crossed.
    pub expired_effects: Vec<Uuid>,
    /// Triggers that fired at a round boundary this command crossed.
    pub activated_triggers: Vec<Uuid>,
    /// The encounter after the command.
    pub encounter: EncounterView,
}

impl CommandResponse {
    fn from_outcome(outcome: CommandOutcome, state: &AppState) -> Self {
        let encounter = EncounterView::build(
            outcome.encounter_id,
            outcome.version,
            &outcome.state,
            state.clock.now(),
            &state.hp_policy,
        );
        Self {
            version: outcome.version,
            expired_effects: outcome.expired_effects,
            activated_triggers: outcome.activated_triggers,
            encounter,
        }
    }
}

async fn dispatch(
    state: &AppState,
    encounter_id: Uuid,
    expected_version: Option<i64>,
    action: CombatAction,
) -> Result<Json<CommandResponse>, ApiError> {
    let mut command = EncounterCommand::new(encounter_id, action);
    command.expected_version = expected_version;

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        "handling combat command"
    );

    let outcome = command_handlers::handle_command(
        &command,
        state.clock.as_ref(),
        &*state.rng,
        &*state.repository,
    )
    .await?;

    Ok(Json(CommandResponse::from_outcome(outcome, state)))
}

/// GET /{encounter_id}
#[instrument(skip(state), fields(encounter_id = %encounter_id))]
async fn get_encounter(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
) -> Result<Json<EncounterView>, ApiError> {
    let view = query_handlers::get_encounter(
        encounter_id,
        state.clock.as_ref(),
        &*state.repository,
        &state.hp_policy,
    )
    .await?;
    Ok(Json(view))
}

/// POST /{encounter_id}/start
#[instrument(skip(state, request), fields(encounter_id = %encounter_id))]
async fn start(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<StartRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let combatants = request.combatants.into_iter().map(Into::into).collect();
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::Start { combatants },
    )
    .await
}

/// POST /{encounter_id}/next-turn
#[instrument(skip(state, request), fields(encounter_id = %encounter_id))]
async fn next_turn(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<VersionedRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(&state, encounter_id, request.expected_version, CombatAction::NextTurn).await
}

/// POST /{encounter_id}/previous-turn
#[instrument(skip(state, request), fields(encounter_id = %encounter_id))]
async fn previous_turn(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<VersionedRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::PreviousTurn,
    )
    .await
}

/// POST /{encounter_id}/pause
#[instrument(skip(state, request), fields(encounter_id = %encounter_id))]
async fn pause(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<VersionedRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(&state, encounter_id, request.expected_version, CombatAction::Pause).await
}

/// POST /{encounter_id}/resume
#[instrument(skip(state, request), fields(encounter_id = %encounter_id))]
async fn resume(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<VersionedRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(&state, encounter_id, request.expected_version, CombatAction::Resume).await
}

/// POST /{encounter_id}/end
#[instrument(skip(state, request), fields(encounter_id = %encounter_id))]
async fn end(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<VersionedRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(&state, encounter_id, request.expected_version, CombatAction::End).await
}

/// POST /{encounter_id}/update-initiative
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn update_initiative(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<UpdateInitiativeRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::UpdateInitiative {
            participant_id: request.participant_id,
            initiative: request.initiative,
            dexterity: request.dexterity,
        },
    )
    .await
}

/// POST /{encounter_id}/delay-action
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn delay_action(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::DelayAction {
            participant_id: request.participant_id,
        },
    )
    .await
}

/// POST /{encounter_id}/resume-delayed
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn resume_delayed(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::ResumeDelayed {
            participant_id: request.participant_id,
        },
    )
    .await
}

/// POST /{encounter_id}/ready-action
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn ready_action(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<ReadyActionRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::ReadyAction {
            participant_id: request.participant_id,
            description: request.description,
        },
    )
    .await
}

/// POST /{encounter_id}/resolve-ready-action
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn resolve_ready_action(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::ResolveReadyAction {
            participant_id: request.participant_id,
        },
    )
    .await
}

/// POST /{encounter_id}/apply-damage
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn apply_damage(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::ApplyDamage {
            participant_id: request.participant_id,
            amount: request.amount,
        },
    )
    .await
}

/// POST /{encounter_id}/apply-healing
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn apply_healing(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::ApplyHealing {
            participant_id: request.participant_id,
            amount: request.amount,
        },
    )
    .await
}

/// POST /{encounter_id}/set-temporary-hp
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn set_temporary_hp(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::SetTemporaryHp {
            participant_id: request.participant_id,
            amount: request.amount,
        },
    )
    .await
}

/// POST /{encounter_id}/set-max-hp
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn set_max_hp(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<SetMaxHpRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::SetMaxHp {
            participant_id: request.participant_id,
            max_hit_points: request.max_hit_points,
        },
    )
    .await
}

/// POST /{encounter_id}/set-current-hp
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn set_current_hp(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<SetCurrentHpRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::SetCurrentHp {
            participant_id: request.participant_id,
            current_hit_points: request.current_hit_points,
        },
    )
    .await
}

/// POST /{encounter_id}/add-participant
#[instrument(skip(state, request), fields(encounter_id = %encounter_id))]
async fn add_participant(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<AddParticipantRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::AddParticipant {
            combatant: request.combatant.into(),
        },
    )
    .await
}

/// POST /{encounter_id}/remove-participant
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn remove_participant(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::RemoveParticipant {
            participant_id: request.participant_id,
        },
    )
    .await
}

/// POST /{encounter_id}/set-participant-active
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.participant_id))]
async fn set_participant_active(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::SetParticipantActive {
            participant_id: request.participant_id,
            active: request.active,
        },
    )
    .await
}

/// POST /{encounter_id}/add-effect
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, participant_id = %request.target_participant_id))]
async fn add_effect(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<AddEffectRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::AddEffect {
            effect_id: Uuid::now_v7(),
            target_participant_id: request.target_participant_id,
            name: request.name,
            remaining_rounds: request.remaining_rounds,
        },
    )
    .await
}

/// POST /{encounter_id}/remove-effect
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, effect_id = %request.effect_id))]
async fn remove_effect(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<RemoveEffectRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::RemoveEffect {
            effect_id: request.effect_id,
        },
    )
    .await
}

/// POST /{encounter_id}/add-trigger
#[instrument(skip(state, request), fields(encounter_id = %encounter_id))]
async fn add_trigger(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<AddTriggerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::AddTrigger {
            trigger_id: Uuid::now_v7(),
            activation_round: request.activation_round,
            description: request.description,
        },
    )
    .await
}

/// POST /{encounter_id}/remove-trigger
#[instrument(skip(state, request), fields(encounter_id = %encounter_id, trigger_id = %request.trigger_id))]
async fn remove_trigger(
    State(state): State<AppState>,
    Path(encounter_id): Path<Uuid>,
    Json(request): Json<RemoveTriggerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    dispatch(
        &state,
        encounter_id,
        request.expected_version,
        CombatAction::RemoveTrigger {
            trigger_id: request.trigger_id,
        },
    )
    .await
}

/// Returns the router for combat encounters.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{encounter_id}", get(get_encounter))
        .route("/{encounter_id}/start", post(start))
        .route("/{encounter_id}/next-turn", post(next_turn))
        .route("/{encounter_id}/previous-turn", post(previous_turn))
        .route("/{encounter_id}/pause", post(pause))
        .route("/{encounter_id}/resume", post(resume))
        .route("/{encounter_id}/end", post(end))
        .route("/{encounter_id}/update-initiative", post(update_initiative))
        .route("/{encounter_id}/delay-action", post(delay_action))
        .route("/{encounter_id}/resume-delayed", post(resume_delayed))
        .route("/{encounter_id}/ready-action", post(ready_action))
        .route(
            "/{encounter_id}/resolve-ready-action",
            post(resolve_ready_action),
        )
        .route("/{encounter_id}/apply-damage", post(apply_damage))
        .route("/{encounter_id}/apply-healing", post(apply_healing))
        .route("/{encounter_id}/set-temporary-hp", post(set_temporary_hp))
        .route("/{encounter_id}/set-max-hp", post(set_max_hp))
        .route("/{encounter_id}/set-current-hp", post(set_current_hp))
        .route("/{encounter_id}/add-participant", post(add_participant))
        .route("/{encounter_id}/remove-participant", post(remove_participant))
        .route(
            "/{encounter_id}/set-participant-active",
            post(set_participant_active),
        )
        .route("/{encounter_id}/add-effect", post(add_effect))
        .route("/{encounter_id}/remove-effect", post(remove_effect))
        .route("/{encounter_id}/add-trigger", post(add_trigger))
        .route("/{encounter_id}/remove-trigger", post(remove_trigger))
}
