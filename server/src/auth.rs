use anyhow::{Result, anyhow};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use platform_api::ApiError;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::http::AppState;

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

pub fn issue_token(
    user_id: Uuid,
    ttl_minutes: i64,
    keys: &TokenKeys,
) -> Result<String> {
    let now = Utc::now();
    let expires_at = Duration::try_minutes(ttl_minutes)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| anyhow!("token lifetime of {ttl_minutes} minutes is out of range"))?;
    let claims = TokenClaims {
        sub: user_id,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    Ok(jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding)?)
}

pub fn decode_token(token: &str, keys: &TokenKeys) -> jsonwebtoken::errors::Result<TokenClaims> {
    jsonwebtoken::decode::<TokenClaims>(token, &keys.decoding, &Validation::default())
        .map(|data| data.claims)
}

/// The caller behind a verified bearer token.
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let claims = decode_token(token, &state.keys).map_err(|err| {
            debug!(error = %err, "rejected bearer token");
            ApiError::Unauthorized
        })?;
        Ok(CurrentUser { id: claims.sub })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_decode_to_the_same_subject() {
        let keys = TokenKeys::from_secret("test-secret");
        let user = Uuid::new_v4();
        let token = issue_token(user, 5, &keys).unwrap();
        assert_eq!(decode_token(&token, &keys).unwrap().sub, user);

        let other = TokenKeys::from_secret("other-secret");
        assert!(decode_token(&token, &other).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = TokenKeys::from_secret("test-secret");
        let token = issue_token(Uuid::new_v4(), -10, &keys).unwrap();
        assert!(decode_token(&token, &keys).is_err());
    }

    #[test]
    fn out_of_range_lifetimes_are_errors() {
        let keys = TokenKeys::from_secret("test-secret");
        assert!(issue_token(Uuid::new_v4(), i64::MAX, &keys).is_err());
        assert!(issue_token(Uuid::new_v4(), i64::MIN, &keys).is_err());
    }
}
