//! Bearer Token Authentication
//!
//! Tokens are HS256 JWTs minted by the shop's auth provider; `sub` is the
//! user id. Handlers take `AuthUser` (or `AdminUser`) as an extractor.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{error_response, ApiError};
use crate::state::AppState;

/// Token claims the server relies on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Validates bearer tokens
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    admins: HashSet<String>,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: Option<&str>, admins: HashSet<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            admins,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.key, &self.validation).map(|data| data.claims)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id)
    }
}

/// Authenticated customer
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Authenticated user listed in `ADMIN_USER_IDS`
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: String,
}

fn unauthenticated(message: &str) -> ApiError {
    error_response(StatusCode::UNAUTHORIZED, message, "UNAUTHENTICATED")
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthenticated("Please sign in to continue."))?;

        let claims = state.auth.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            unauthenticated("Your session has expired. Please sign in again.")
        })?;

        if claims.sub.is_empty() {
            return Err(unauthenticated("Please sign in to continue."));
        }
        Ok(Self { user_id: claims.sub })
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !state.auth.is_admin(&user.user_id) {
            tracing::warn!(user_id = %user.user_id, "Non-admin attempted admin action");
            return Err(error_response(
                StatusCode::FORBIDDEN,
                "You don't have access to that.",
                "FORBIDDEN",
            ));
        }
        Ok(Self {
            user_id: user.user_id,
        })
    }
}
