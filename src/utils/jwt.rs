// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::{
        class::{Class, ClassStatus},
        user::Role,
    },
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID.
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Cohort(s), whitespace separated for teachers.
    pub group: Option<String>,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// The verified caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub group: Option<String>,
}

impl Principal {
    /// Lower-cased groups the principal belongs to.
    pub fn groups(&self) -> Vec<String> {
        self.group
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }

    /// Admins see every class, everyone else only opened classes of their groups.
    pub fn can_view(&self, class: &Class) -> bool {
        if self.role == Role::Admin {
            return true;
        }
        class.status == ClassStatus::Opened && self.groups().contains(&class.group.to_lowercase())
    }

    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role.at_least(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(crate::error::FORBIDDEN.to_string()))
        }
    }
}

impl TryFrom<Claims> for Principal {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;
        Ok(Principal {
            id,
            username: claims.username,
            role: claims.role,
            group: claims.group,
        })
    }
}

/// Signs a new JWT for the user.
pub fn sign_jwt(
    id: Uuid,
    username: &str,
    role: Role,
    group: Option<&str>,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(),
        username: username.to_owned(),
        role,
        group: group.map(str::to_owned),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header.
/// If valid, injects the `Principal` into the request extensions for handlers to use.
/// If invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return Err(StatusCode::UNAUTHORIZED),
    };

    let principal = verify_jwt(token, &config.jwt_secret)
        .and_then(Principal::try_from)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Axum Middleware: Teacher Authorization.
///
/// Must be used AFTER `auth_middleware`. Lets teachers and admins through.
/// Everyone else gets 403 Forbidden.
pub async fn teacher_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !principal.role.at_least(Role::Teacher) {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip_yields_principal() {
        let id = Uuid::new_v4();
        let token = sign_jwt(id, "kate", Role::Student, Some("10A"), "secret", 60).unwrap();
        let principal = Principal::try_from(verify_jwt(&token, "secret").unwrap()).unwrap();

        assert_eq!(principal.id, id);
        assert_eq!(principal.role, Role::Student);
        assert_eq!(principal.groups(), vec!["10a".to_string()]);
        assert!(verify_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn teachers_can_hold_several_groups() {
        let teacher = Principal {
            id: Uuid::new_v4(),
            username: "mr_lee".to_string(),
            role: Role::Teacher,
            group: Some("10A 10B".to_string()),
        };
        assert_eq!(teacher.groups(), vec!["10a".to_string(), "10b".to_string()]);
        assert!(teacher.require(Role::Teacher).is_ok());
        assert!(teacher.require(Role::Admin).is_err());
    }
}
