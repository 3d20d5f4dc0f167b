//! Directory introspection API handlers

use crate::api::SuccessResponse;
use crate::domain::AccessTestInput;
use crate::error::Result;
use crate::state::HasServices;
use axum::{extract::State, response::IntoResponse, Json};

/// List trusted domains
pub async fn trusts<S: HasServices>(State(state): State<S>) -> Result<impl IntoResponse> {
    let trusts = state.system_service().trusts().await?;
    Ok(Json(SuccessResponse::new(trusts)))
}

/// Service and directory status
pub async fn status<S: HasServices>(State(state): State<S>) -> Result<impl IntoResponse> {
    let status = state.system_service().status().await?;
    Ok(Json(SuccessResponse::new(status)))
}

/// Evaluate a user's access to a host
pub async fn test_access<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<AccessTestInput>,
) -> Result<impl IntoResponse> {
    let result = state.system_service().test_access(input).await?;
    Ok(Json(SuccessResponse::new(result)))
}

/// Full configuration document with its export time
pub async fn export<S: HasServices>(State(state): State<S>) -> Result<impl IntoResponse> {
    let export = state.system_service().export().await?;
    Ok(Json(export))
}
