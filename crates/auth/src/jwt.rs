//! JWT decoding and verification.
//!
//! Signature verification lives behind a trait so the API layer can swap
//! algorithms (or a verification stub in tests) without touching handlers.
//! Time-window checks are delegated to [`validate_claims`] so they stay
//! deterministic and clock-injectable.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use crate::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>)
    -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 validator with a shared secret.
pub struct Hs256JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<JwtClaims, TokenValidationError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenValidationError::Malformed)?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use lexbill_core::TenantId;

    use crate::{PrincipalId, Role};

    const SECRET: &[u8] = b"test-secret";

    fn mint(claims: &JwtClaims, secret: &[u8]) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: PrincipalId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::new("reviewer")],
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn round_trips_a_valid_token() {
        let now = Utc::now();
        let claims = claims(now);
        let token = mint(&claims, SECRET);

        let validator = Hs256JwtValidator::new(SECRET);
        let decoded = validator.validate(&token, now).unwrap();

        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.tenant_id, claims.tenant_id);
        assert_eq!(decoded.roles, claims.roles);
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let token = mint(&claims(now), b"other-secret");

        let validator = Hs256JwtValidator::new(SECRET);
        assert_eq!(
            validator.validate(&token, now),
            Err(TokenValidationError::Malformed)
        );
    }

    #[test]
    fn rejects_garbage_token() {
        let validator = Hs256JwtValidator::new(SECRET);
        assert_eq!(
            validator.validate("not.a.jwt", Utc::now()),
            Err(TokenValidationError::Malformed)
        );
    }

    #[test]
    fn rejects_expired_token_against_caller_clock() {
        let now = Utc::now();
        let token = mint(&claims(now), SECRET);

        let validator = Hs256JwtValidator::new(SECRET);
        assert_eq!(
            validator.validate(&token, now + Duration::hours(2)),
            Err(TokenValidationError::Expired)
        );
    }
}
