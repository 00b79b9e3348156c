use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Password reset token. Only `digest` is stored; `token` goes out by email.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn generate(ttl_minutes: i64) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self {
            digest: digest(&token),
            token,
            expires_at: Utc::now() + Duration::minutes(ttl_minutes),
        }
    }
}

/// Hex SHA-256 digest of a reset token
pub fn digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_matches_its_digest() {
        let reset = ResetToken::generate(10);
        assert_eq!(reset.token.len(), 32);
        assert_eq!(reset.digest.len(), 64);
        assert_eq!(digest(&reset.token), reset.digest);
        assert_ne!(digest("another"), reset.digest);
    }

    #[test]
    fn expiry_is_ttl_from_now() {
        let before = Utc::now();
        let reset = ResetToken::generate(10);
        assert!(reset.expires_at >= before + Duration::minutes(10));
        assert!(reset.expires_at <= Utc::now() + Duration::minutes(10));
    }
}
