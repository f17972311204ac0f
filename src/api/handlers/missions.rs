/*
 * Responsibility
 * - /missions CRUD handlers
 * - Access is decided by the middleware; handlers only read the identity for audit logs
 */
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    api::{
        dto::missions::{CreateMissionRequest, MissionResponse, UpdateMissionRequest},
        extractors::{CurrentIdentity, MaybeIdentity},
    },
    error::AppError,
    state::AppState,
};

pub async fn list_missions(
    State(state): State<AppState>,
    MaybeIdentity(identity): MaybeIdentity,
) -> Json<Vec<MissionResponse>> {
    let rows = state.missions.list().await;
    tracing::debug!(
        sub = identity.as_ref().map(|i| i.subject()),
        count = rows.len(),
        "listing missions"
    );

    Json(rows.into_iter().map(MissionResponse::from).collect())
}

pub async fn create_mission(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(req): Json<CreateMissionRequest>,
) -> Result<(StatusCode, Json<MissionResponse>), AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("invalid_mission", msg))?;

    let row = state
        .missions
        .create(req.name.trim(), req.status.trim())
        .await;
    info!(sub = identity.subject(), id = row.id, "mission created");

    Ok((StatusCode::CREATED, Json(row.into())))
}

pub async fn update_mission(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMissionRequest>,
) -> Result<StatusCode, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("invalid_mission", msg))?;

    state
        .missions
        .update(
            id,
            req.name.as_deref().map(str::trim),
            req.status.as_deref().map(str::trim),
        )
        .await
        .ok_or(AppError::not_found("mission"))?;
    info!(sub = identity.subject(), id, "mission updated");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_mission(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.missions.delete(id).await {
        return Err(AppError::not_found("mission"));
    }
    info!(sub = identity.subject(), id, "mission deleted");

    Ok(StatusCode::NO_CONTENT)
}
