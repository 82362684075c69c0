//! Session token service
//!
//! Stateless HS256 JWTs carrying the user id (`sub`), issue time and expiry.
//! There is no revocation list: a token stays valid until it expires.

use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Claims embedded in every session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX / 2),
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Sign a token for `user_id` that expires after the configured TTL.
    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Check signature, then expiry, and return the embedded user id.
    pub fn verify(&self, token: &str) -> Result<i64, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        data.claims.sub.parse::<i64>().map_err(|_| TokenError::Invalid)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_issue_and_verify() {
        let service = TokenService::new("test-secret", 3600);
        let token = service.issue(42).unwrap();
        assert_eq!(service.verify(&token).unwrap(), 42);
    }

    #[test]
    fn test_tokens_are_unique() {
        let service = TokenService::new("test-secret", 3600);
        assert_ne!(service.issue(1).unwrap(), service.issue(1).unwrap());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenService::new("secret-one", 3600);
        let verifier = TokenService::new("secret-two", 3600);
        let token = issuer.issue(7).unwrap();
        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_garbage_rejected() {
        let service = TokenService::new("test-secret", 3600);
        assert!(matches!(service.verify("not.a.token"), Err(TokenError::Invalid)));
        assert!(matches!(service.verify(""), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let service = TokenService::new("test-secret", 3600);
        let token = service.issue(1).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = service.issue(2).unwrap();
        let forged_payload = forged.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;
        let spliced = parts.join(".");
        assert!(matches!(service.verify(&spliced), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_non_numeric_subject_rejected() {
        let service = TokenService::new("test-secret", 3600);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "alice".to_string(),
            iat: now,
            exp: now + 60,
            jti: "x".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn test_token_expires_after_ttl() {
        let service = TokenService::new("test-secret", 1);
        let token = service.issue(9).unwrap();
        assert_eq!(service.verify(&token).unwrap(), 9);

        tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

        assert!(matches!(service.verify(&token), Err(TokenError::Expired)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn verify_resolves_issued_subject(user_id in 1i64..i64::MAX) {
            let service = TokenService::new("prop-secret", 600);
            let token = service.issue(user_id).unwrap();
            prop_assert_eq!(service.verify(&token).unwrap(), user_id);
        }
    }
}
