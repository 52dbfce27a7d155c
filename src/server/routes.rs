use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use reelvote_core::{
    points::PointEventKind,
    rewards::{next_milestone, reward_for, StreakReward, REWARD_TABLE},
    streak::UserStreak,
    vote::VoteSummary,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::{
    ledger::LeaderboardEntry,
    state::{AppState, CastReceipt},
};

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoteRequest {
    pub movie_id: String,
    pub vote_type: bool,
    pub wallet_address: String,
}

#[derive(Serialize)]
pub struct VotedResponse {
    pub voted: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PointsRequest {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: PointEventKind,
    #[serde(default)]
    pub event_id: Option<String>,
}

#[derive(Serialize)]
pub struct PointsResponse {
    pub address: String,
    pub delta: u64,
    pub points: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakResponse {
    pub streak: UserStreak,
    pub next_milestone: Option<StreakReward>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardResponse {
    pub streak: u32,
    pub reward: u32,
    pub next_milestone: Option<StreakReward>,
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

fn payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::MalformedPayload(rejection.body_text()))
}

/// Write the state file off the runtime threads.
async fn save(state: &Arc<AppState>) -> Result<(), ApiError> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || state.persist())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(())
}

pub async fn health_handler() -> &'static str {
    "ok"
}

pub async fn votes_handler(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<String>,
) -> Result<Json<VoteSummary>, ApiError> {
    Ok(Json(state.tally.get_votes(&movie_id).await?))
}

pub async fn voted_handler(
    State(state): State<Arc<AppState>>,
    Path((movie_id, address)): Path<(String, String)>,
) -> Result<Json<VotedResponse>, ApiError> {
    let voted = state.tally.has_user_voted(&movie_id, &address).await?;
    Ok(Json(VotedResponse { voted }))
}

pub async fn cast_vote_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<CastReceipt>, ApiError> {
    let request = payload(body)?;
    let receipt = state
        .cast_vote(&request.movie_id, request.vote_type, &request.wallet_address)
        .await?;
    save(&state).await?;
    Ok(Json(receipt))
}

pub async fn points_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PointsRequest>, JsonRejection>,
) -> Result<Json<PointsResponse>, ApiError> {
    let request = payload(body)?;
    let profile = state.record_points(&request.address, request.kind, request.event_id.as_deref())?;
    save(&state).await?;
    Ok(Json(PointsResponse {
        address: request.address.trim().to_string(),
        delta: request.kind.delta(),
        points: profile.points,
    }))
}

pub async fn streak_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<StreakResponse>, ApiError> {
    let streak = state.streaks.streak(&address)?;
    let next_milestone = next_milestone(streak.current_streak).copied();
    Ok(Json(StreakResponse {
        streak,
        next_milestone,
    }))
}

pub async fn rewards_handler() -> Json<&'static [StreakReward]> {
    Json(&REWARD_TABLE[..])
}

pub async fn reward_handler(Path(streak): Path<u32>) -> Json<RewardResponse> {
    Json(RewardResponse {
        streak,
        reward: reward_for(streak),
        next_milestone: next_milestone(streak).copied(),
    })
}

pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<LeaderboardEntry>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .min(MAX_LEADERBOARD_LIMIT);
    let entries = state.ledger.lock().leaderboard(limit);
    Json(entries)
}
