//! Access boundary: password-login JWTs, hashed API keys, and PKCE bearer
//! tokens all resolve to the same `UserId` through one extractor.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use base64::Engine;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;

use db::{ApiKeyRepository, OauthRepository};
use shared::types::UserId;

use crate::state::AppState;

/// Prefix on raw API keys and PKCE bearer tokens
pub const API_KEY_PREFIX: &str = "ts_";
/// Characters of the raw key shown in listings
pub const DISPLAY_PREFIX_LEN: usize = 12;

/// JWT claims for password-login sessions
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn new(user_id: UserId, expires_in_hours: i64) -> Self {
        let now = chrono::Utc::now();
        Self {
            sub: user_id.to_string(),
            exp: (now + chrono::Duration::hours(expires_in_hours)).timestamp() as usize,
            iat: now.timestamp() as usize,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.sub.parse().ok()
    }
}

/// Create a JWT session token
pub fn create_token(user_id: UserId, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, 24);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify and decode a JWT session token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Generate a raw API key and its display prefix
pub fn generate_api_key() -> (String, String) {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = format!("{}{}", API_KEY_PREFIX, hex::encode(bytes));
    let prefix = raw[..DISPLAY_PREFIX_LEN].to_string();
    (raw, prefix)
}

/// Salted SHA-256 of a secret token; the salt is a server-side secret so
/// the hash stays deterministic for lookup.
pub fn hash_secret(secret: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// PKCE S256: base64url(sha256(verifier)), no padding
pub fn s256_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Random hex secret for authorization codes and bearer tokens
pub fn generate_secret(prefix: &str) -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", prefix, hex::encode(bytes))
}

/// Extractor for the authenticated user
pub struct AuthUser {
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 AppState,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let state = state.clone();
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.to_string());

        Box::pin(async move {
            let token =
                token.ok_or((StatusCode::UNAUTHORIZED, "Missing authorization header"))?;

            // API keys and PKCE tokens share the hashed-lookup path
            if token.starts_with(API_KEY_PREFIX) {
                let hash = hash_secret(&token, &state.config.jwt_secret);

                if let Some(key) = ApiKeyRepository::find_by_hash(&state.pool, &hash)
                    .await
                    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Credential lookup failed"))?
                {
                    return Ok(AuthUser { user_id: key.user_id });
                }

                if let Some(token_row) = OauthRepository::find_token_by_hash(&state.pool, &hash)
                    .await
                    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Credential lookup failed"))?
                {
                    return Ok(AuthUser {
                        user_id: token_row.user_id,
                    });
                }

                return Err((StatusCode::UNAUTHORIZED, "Invalid token"));
            }

            let claims = verify_token(&token, &state.config.jwt_secret)
                .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid token"))?;

            let user_id = claims
                .user_id()
                .ok_or((StatusCode::UNAUTHORIZED, "Invalid user ID in token"))?;

            Ok(AuthUser { user_id })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_round_trip() {
        let user_id = UserId::new();
        let token = create_token(user_id, "secret").unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id(), Some(user_id));

        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_api_key_shape() {
        let (raw, prefix) = generate_api_key();
        assert!(raw.starts_with(API_KEY_PREFIX));
        assert_eq!(raw.len(), API_KEY_PREFIX.len() + 40);
        assert_eq!(prefix.len(), DISPLAY_PREFIX_LEN);
        assert!(raw.starts_with(&prefix));
    }

    #[test]
    fn test_hash_is_salted_and_deterministic() {
        let a = hash_secret("ts_abc", "salt-1");
        let b = hash_secret("ts_abc", "salt-1");
        let c = hash_secret("ts_abc", "salt-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_s256_challenge_known_vector() {
        // RFC 7636 appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            s256_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }
}
