//! Signed identity tokens (HS256 JWTs).
//!
//! Expiry is the only invalidation mechanism; rotating the secret
//! invalidates every outstanding token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user_id: &str, name: &str) -> Result<String, AppError> {
        self.issue_at(user_id, name, Utc::now())
    }

    pub fn issue_at(&self, user_id: &str, name: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            user_id: user_id.to_string(),
            name: name.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| AppError::Internal(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::TokenInvalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", Duration::days(30))
    }

    #[test]
    fn issued_token_verifies() {
        let token = issuer().issue("user-1", "Ana").unwrap();
        assert_eq!(token.split('.').count(), 3);
        let claims = issuer().verify(&token).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.name, "Ana");
        assert_eq!(claims.exp - claims.iat, Duration::days(30).num_seconds());
    }

    #[test]
    fn token_expires_after_ttl() {
        let stale = issuer()
            .issue_at("user-1", "Ana", Utc::now() - Duration::days(31))
            .unwrap();
        assert!(matches!(issuer().verify(&stale), Err(AppError::TokenExpired)));

        let fresh = issuer()
            .issue_at("user-1", "Ana", Utc::now() - Duration::days(29))
            .unwrap();
        assert!(issuer().verify(&fresh).is_ok());
    }

    #[test]
    fn rotated_secret_rejects_old_tokens() {
        let token = issuer().issue("user-1", "Ana").unwrap();
        let rotated = TokenIssuer::new("another-secret", Duration::days(30));
        assert!(matches!(rotated.verify(&token), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn swapped_payload_is_rejected() {
        let ana = issuer().issue("user-1", "Ana").unwrap();
        let mallory = issuer().issue("user-2", "Mallory").unwrap();
        let ana_parts: Vec<&str> = ana.split('.').collect();
        let mallory_parts: Vec<&str> = mallory.split('.').collect();
        let forged = format!("{}.{}.{}", ana_parts[0], mallory_parts[1], ana_parts[2]);
        assert!(matches!(issuer().verify(&forged), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        for token in ["", "abc", "a.b", "a.b.c", "..."] {
            assert!(
                matches!(issuer().verify(token), Err(AppError::TokenInvalid)),
                "token {token:?}"
            );
        }
    }
}
