//! Demo collections (jobs, proposals, messages), stored as whole JSON arrays
//! and seeded with demo data on first read.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use shared::{demo::demo_payload, Collection};

use crate::{error::AppError, routes::auth::AuthUser, state::AppState};

fn parse(name: &str) -> Result<Collection, AppError> {
    name.parse::<Collection>().map_err(AppError::NotFound)
}

/// GET /collections/:name
pub async fn get_collection(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let collection = parse(&name)?;

    if let Some(payload) = state.db.get_collection(collection.as_str()).await? {
        return Ok(Json(payload));
    }

    let seed = demo_payload(collection);
    state.db.put_collection(collection.as_str(), &seed).await?;
    tracing::info!("Seeded {} with demo data", collection);
    Ok(Json(seed))
}

/// PUT /collections/:name
pub async fn put_collection(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(name): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let collection = parse(&name)?;
    if !payload.is_array() {
        return Err(AppError::BadRequest(format!(
            "{} must be a JSON array",
            collection
        )));
    }

    state.db.put_collection(collection.as_str(), &payload).await?;
    Ok(Json(payload))
}
