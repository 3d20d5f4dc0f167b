//! Temporary access API handlers

use crate::api::SuccessResponse;
use crate::domain::{AccessRequestStatus, DecisionInput, TemporaryAccessInput};
use crate::error::{AppError, Result};
use crate::state::HasServices;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// List requests, optionally filtered by `?status=`
pub async fn list<S: HasServices>(
    State(state): State<S>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<AccessRequestStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let requests = state.temporary_access_service().list(status).await?;
    Ok(Json(SuccessResponse::new(requests)))
}

/// Grant access immediately
pub async fn grant<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<TemporaryAccessInput>,
) -> Result<impl IntoResponse> {
    let request = state.temporary_access_service().grant(input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(request))))
}

/// File a request awaiting approval
pub async fn request<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<TemporaryAccessInput>,
) -> Result<impl IntoResponse> {
    let request = state.temporary_access_service().request(input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(request))))
}

pub async fn get<S: HasServices>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let request = state.temporary_access_service().get(id).await?;
    Ok(Json(SuccessResponse::new(request)))
}

pub async fn approve<S: HasServices>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    body: Option<Json<DecisionInput>>,
) -> Result<impl IntoResponse> {
    let actor = actor(body)?;
    let request = state.temporary_access_service().approve(id, actor).await?;
    Ok(Json(SuccessResponse::new(request)))
}

pub async fn deny<S: HasServices>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    body: Option<Json<DecisionInput>>,
) -> Result<impl IntoResponse> {
    let actor = actor(body)?;
    let request = state.temporary_access_service().deny(id, actor).await?;
    Ok(Json(SuccessResponse::new(request)))
}

pub async fn revoke<S: HasServices>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    body: Option<Json<DecisionInput>>,
) -> Result<impl IntoResponse> {
    let actor = actor(body)?;
    let request = state.temporary_access_service().revoke(id, actor).await?;
    Ok(Json(SuccessResponse::new(request)))
}

/// Run an expiration sweep now
pub async fn sweep<S: HasServices>(State(state): State<S>) -> Result<impl IntoResponse> {
    let summary = state.temporary_access_service().expire_sweep().await?;
    Ok(Json(SuccessResponse::new(summary)))
}

fn actor(body: Option<Json<DecisionInput>>) -> Result<Option<String>> {
    let Some(Json(input)) = body else {
        return Ok(None);
    };
    input.validate()?;
    Ok(input.actor)
}
