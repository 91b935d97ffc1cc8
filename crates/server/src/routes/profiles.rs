//! Profile documents, one per principal, keyed by the principal id

use axum::{
    extract::{Path, State},
    Json,
};
use shared::{ProfilePatch, ProfileRecord};

use crate::{error::AppError, routes::auth::AuthUser, state::AppState};

/// GET /profiles/:id
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProfileRecord>, AppError> {
    auth.require_owner(&id)?;
    state
        .db
        .get_profile(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No profile for {}", id)))
}

/// Create or overwrite
/// PUT /profiles/:id
pub async fn put_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(record): Json<ProfileRecord>,
) -> Result<Json<ProfileRecord>, AppError> {
    auth.require_owner(&id)?;
    if record.id != id {
        return Err(AppError::BadRequest(format!(
            "Profile id {} does not match path {}",
            record.id, id
        )));
    }

    state.db.put_profile(&record).await?;
    tracing::info!("Stored profile {} (role {:?})", id, record.role);
    Ok(Json(record))
}

/// PATCH /profiles/:id
pub async fn patch_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<ProfileRecord>, AppError> {
    auth.require_owner(&id)?;
    let updated = state
        .db
        .update_profile(&id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No profile for {}", id)))?;
    tracing::debug!("Patched profile {}", id);
    Ok(Json(updated))
}
