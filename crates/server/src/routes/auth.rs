use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::request::Parts,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::{
    AuthResponse, DeviceCodeRequest, DeviceCodeResponse, DeviceCompleteRequest, DevicePollRequest,
    DevicePollResponse, LoginRequest, RegisterRequest,
};
use uuid::Uuid;

use crate::{
    config::{AuthConfig, FederatedConfig},
    db::{FederatedLogin, User},
    error::AppError,
    state::{AppState, DeviceCodeState},
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub exp: usize,
}

/// Caller identified by a valid bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl AuthUser {
    /// Profiles and usage counters are only reachable by their owner
    pub fn require_owner(&self, id: &str) -> Result<(), AppError> {
        if self.user_id != id {
            return Err(AppError::Forbidden(format!(
                "Not allowed to access records of {}",
                id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::AuthError("Missing or invalid Authorization header".to_string())
                })?;
        let claims = verify_token(bearer.token(), &state.config.auth.jwt_secret)?;
        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        password_hash: Some(hash_password(&req.password)?),
        provider: None,
        display_name: None,
        photo_url: None,
        created_at: None,
    };
    state.db.create_user(&user).await?;
    tracing::info!("Registered user {}", user.id);

    issue(&user, &state.config.auth)
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::AuthError("Invalid email or password".to_string());

    let user = state
        .db
        .get_user_by_email(&req.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    // Federated-only accounts have no password to check against
    let stored = user.password_hash.as_deref().ok_or_else(invalid)?;
    let parsed_hash =
        PasswordHash::new(stored).map_err(|e| AppError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    issue(&user, &state.config.auth)
}

/// Fresh token and session for the caller's account
/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .db
        .get_user_by_id(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))?;
    issue(&user, &state.config.auth)
}

fn issue(user: &User, auth_config: &AuthConfig) -> Result<Json<AuthResponse>, AppError> {
    let token = generate_token(user, auth_config)?;
    Ok(Json(AuthResponse {
        token,
        session: user.session(),
    }))
}

fn generate_token(user: &User, auth_config: &AuthConfig) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthError(e.to_string()))
}

// ============================================================================
// Federated sign-in (device code flow)
// ============================================================================

fn new_device_code() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Start a federated sign-in. The user finishes it on the provider page
/// at `url` while the caller polls with `code`.
/// POST /auth/device-code
pub async fn device_code(
    State(state): State<AppState>,
    Json(req): Json<DeviceCodeRequest>,
) -> Json<DeviceCodeResponse> {
    let code = new_device_code();
    let ttl = state.config.federated.device_code_ttl_secs;
    let expires_at = Utc::now() + Duration::seconds(ttl as i64);

    state.device_codes.insert(
        code.clone(),
        DeviceCodeState {
            provider: req.provider,
            expires_at,
            user_id: None,
        },
    );

    tracing::info!("Generated {} device code: {}", req.provider, code);

    Json(DeviceCodeResponse {
        url: format!(
            "{}/auth/{}?code={}",
            state.config.federated.web_ui_url, req.provider, code
        ),
        code,
        expires_in: ttl,
    })
}

/// POST /auth/device-poll
pub async fn device_poll(
    State(state): State<AppState>,
    Json(req): Json<DevicePollRequest>,
) -> Result<Json<DevicePollResponse>, AppError> {
    state.device_codes.retain(|_, v| v.expires_at > Utc::now());

    let linked = match state.device_codes.get(&req.code) {
        None => return Ok(Json(DevicePollResponse::Expired)),
        Some(code_state) => code_state.user_id.clone(),
    };
    let Some(user_id) = linked else {
        return Ok(Json(DevicePollResponse::Pending));
    };

    state.device_codes.remove(&req.code);
    let user = state
        .db
        .get_user_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Linked user {} not found", user_id)))?;
    tracing::info!("Device code {} completed for user {}", req.code, user_id);

    let token = generate_token(&user, &state.config.auth)?;
    Ok(Json(DevicePollResponse::Success {
        token,
        session: user.session(),
    }))
}

/// Claims of an ID token minted by the provider bridge
#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub exp: usize,
}

pub fn verify_provider_token(token: &str, config: &FederatedConfig) -> Result<ProviderClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.id_token_issuer]);
    validation.set_audience(&[&config.id_token_audience]);

    decode::<ProviderClaims>(
        token,
        &DecodingKey::from_secret(config.id_token_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthError(format!("Invalid provider token: {}", e)))
}

/// Called by the provider callback page once consent was given. The account
/// comes from the verified ID token and the provider from the device code.
/// POST /auth/device-complete
pub async fn device_complete(
    State(state): State<AppState>,
    Json(req): Json<DeviceCompleteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (provider, expired) = match state.device_codes.get(&req.code) {
        None => return Err(AppError::BadRequest("Invalid device code".to_string())),
        Some(code_state) => (code_state.provider, code_state.expires_at <= Utc::now()),
    };
    if expired {
        state.device_codes.remove(&req.code);
        return Err(AppError::BadRequest("Device code expired".to_string()));
    }

    let claims = verify_provider_token(&req.id_token, &state.config.federated)?;
    if !claims.email_verified {
        return Err(AppError::AuthError(
            "Provider did not verify the email address".to_string(),
        ));
    }

    let email = claims.email.trim().to_lowercase();
    let user = state
        .db
        .upsert_federated_user(&FederatedLogin {
            email: email.clone(),
            provider: provider.to_string(),
            display_name: claims.name,
            photo_url: claims.picture,
        })
        .await?
        .ok_or_else(|| {
            tracing::warn!("Refused {} sign-in onto existing account {}", provider, email);
            AppError::Conflict(format!(
                "{} is registered with another sign-in method",
                email
            ))
        })?;

    if let Some(mut code_state) = state.device_codes.get_mut(&req.code) {
        code_state.user_id = Some(user.id.clone());
    }
    tracing::info!("Device code {} linked to user {}", req.code, user.id);
    Ok(Json(serde_json::json!({ "success": true })))
}
