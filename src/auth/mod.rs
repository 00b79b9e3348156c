pub mod password;
pub mod reset;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Password hashing error: {0}")]
    Hashing(String),
}

/// Session token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        let expires_in = Duration::days(config::config().security.jwt_expires_in_days);
        Self {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
        }
    }

    /// True when the password was changed after this token was issued
    pub fn issued_before(&self, password_changed_at: Option<DateTime<Utc>>) -> bool {
        password_changed_at.is_some_and(|changed| changed.timestamp() > self.iat)
    }
}

fn secret() -> Result<&'static [u8], AuthError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }
    Ok(secret.as_bytes())
}

pub fn encode_claims(claims: &Claims) -> Result<String, AuthError> {
    let encoding_key = EncodingKey::from_secret(secret()?);
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Signs a session token for the given user
pub fn sign_token(user_id: Uuid) -> Result<String, AuthError> {
    encode_claims(&Claims::new(user_id))
}

pub fn verify_token(token: &str) -> Result<Claims, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret()?);
    decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256))
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let user_id = Uuid::new_v4();
        let token = sign_token(user_id).unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_token_is_invalid() {
        let token = sign_token(Uuid::new_v4()).unwrap();
        let (head, signature) = token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{}.{}{}", head, flipped, &signature[1..]);
        assert!(matches!(verify_token(&tampered), Err(AuthError::InvalidToken)));
        assert!(matches!(verify_token("not-a-token"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: (now - Duration::days(3)).timestamp(),
            exp: (now - Duration::days(1)).timestamp(),
        };
        let token = encode_claims(&claims).unwrap();
        assert!(matches!(verify_token(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn password_change_invalidates_older_tokens() {
        let claims = Claims::new(Uuid::new_v4());
        let issued = DateTime::from_timestamp(claims.iat, 0).unwrap();
        assert!(!claims.issued_before(None));
        assert!(!claims.issued_before(Some(issued - Duration::seconds(1))));
        assert!(claims.issued_before(Some(issued + Duration::seconds(5))));
    }
}
