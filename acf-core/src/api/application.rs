//! Application API handlers

use crate::api::{MessageResponse, SuccessResponse};
use crate::domain::CreateApplicationInput;
use crate::error::Result;
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// List declared applications
pub async fn list<S: HasServices>(State(state): State<S>) -> Result<impl IntoResponse> {
    let applications = state.application_service().list().await?;
    Ok(Json(SuccessResponse::new(applications)))
}

/// Declare an application
pub async fn create<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<CreateApplicationInput>,
) -> Result<impl IntoResponse> {
    let application = state.application_service().create(input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(application))))
}

/// Get application by name
pub async fn get<S: HasServices>(
    State(state): State<S>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let application = state.application_service().get(&name).await?;
    Ok(Json(SuccessResponse::new(application)))
}

/// Delete an application declaration
pub async fn delete<S: HasServices>(
    State(state): State<S>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    state.application_service().delete(&name).await?;
    Ok(Json(MessageResponse::new(format!(
        "Application {} deleted",
        name
    ))))
}

/// Provision the application's directory objects
pub async fn apply<S: HasServices>(
    State(state): State<S>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let report = state.provisioner().apply(&name).await?;
    Ok(Json(SuccessResponse::new(report)))
}
