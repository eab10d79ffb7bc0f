// src/handlers/auth.rs

use axum::{Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::LoginRequest,
    store::Store,
    utils::{hash::verify_password, jwt::sign_jwt},
};

/// Authenticates a user and returns a JWT token.
///
/// Unknown user and wrong password both answer 401 with the same message.
pub async fn login(
    State(store): State<Store>,
    State(config): State<Config>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let user = store
        .users
        .find_by_username(&payload.username)
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        tracing::warn!("Failed login for {}", user.username);
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let token = sign_jwt(
        user.id,
        &user.username,
        user.role,
        user.group.as_deref(),
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role
    })))
}
