use axum::{
    extract::{Path, State},
    Json,
};
use shared::UsageResponse;

use crate::{error::AppError, routes::auth::AuthUser, state::AppState};

/// GET /usage/:id
pub async fn get_usage(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UsageResponse>, AppError> {
    auth.require_owner(&id)?;
    let count = state.db.get_usage(&id).await?;
    Ok(Json(UsageResponse { count }))
}

/// POST /usage/:id/increment
pub async fn increment_usage(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UsageResponse>, AppError> {
    auth.require_owner(&id)?;
    let count = state.db.increment_usage(&id).await?;
    tracing::debug!("Usage for {} is now {}", id, count);
    Ok(Json(UsageResponse { count }))
}
