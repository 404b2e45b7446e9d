use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::Utc;
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    repository::RepositoryState,
};

/// Role claim for a customer session.
pub const ROLE_USER: &str = "user";
/// Role claim for an admin session.
pub const ROLE_ADMIN: &str = "admin";

/// Session token lifetime: seven days.
const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Claims
///
/// The structured payload signed into every session token. Admin tokens carry
/// the same claim set with `role = "admin"`, so verification is a signature,
/// expiry, and role check rather than a comparison against any literal secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID, or the admin email for admin sessions.
    pub sub: String,
    /// Role discriminator: "user" or "admin".
    pub role: String,
    /// Expiration time (seconds since epoch). Always validated.
    pub exp: usize,
    /// Issued-at time (seconds since epoch).
    pub iat: usize,
}

/// issue_token
///
/// Signs a fresh session token for the given subject and role, valid for
/// seven days.
pub fn issue_token(sub: &str, role: &str, secret: &str) -> ApiResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (now + TOKEN_TTL_SECS) as usize,
        iat: now as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

/// decode_claims
///
/// Verifies signature and expiry and returns the claim set. All failure
/// modes collapse into `Unauthenticated`; the distinction only matters for
/// logging.
pub fn decode_claims(token: &str, secret: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("session token expired");
                }
                other => {
                    tracing::debug!("session token rejected: {:?}", other);
                }
            }
            Err(ApiError::Unauthenticated)
        }
    }
}

/// extract_token_header
///
/// The storefront client presents its credential in a custom `token` header
/// rather than the standard bearer-authorization header.
fn extract_token_header(parts: &Parts) -> ApiResult<&str> {
    parts
        .headers
        .get("token")
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthenticated)
}

/// AuthUser
///
/// The resolved identity of an authenticated customer request. Implements
/// `FromRequestParts`, so any handler that takes an `AuthUser` argument is
/// automatically behind the user auth gate.
///
/// The process:
/// 1. Pull the `token` header.
/// 2. Verify signature, expiry, and the "user" role claim.
/// 3. Look the subject up in the database, rejecting tokens for users that
///    no longer exist.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The unique identifier of the authenticated user.
    pub id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = extract_token_header(parts)?;
        let claims = decode_claims(token, &config.jwt_secret)?;

        if claims.role != ROLE_USER {
            return Err(ApiError::Unauthenticated);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthenticated)?;

        // Final verification: a syntactically valid token is still rejected
        // if the subject no longer maps to a live account.
        let user = repo
            .get_user(user_id)
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(AuthUser { id: user.id })
    }
}

/// AdminUser
///
/// The admin variant of the auth gate. Admin identity is not database-backed:
/// the claim set itself (signed role + expiry) is the credential, issued only
/// by a successful admin login against the injected configuration secrets.
#[derive(Debug, Clone)]
pub struct AdminUser {
    /// The configured admin email the session was issued for.
    pub email: String,
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let token = extract_token_header(parts)?;
        let claims = decode_claims(token, &config.jwt_secret)?;

        if claims.role != ROLE_ADMIN {
            return Err(ApiError::Unauthenticated);
        }

        Ok(AdminUser { email: claims.sub })
    }
}

// --- Credential Helpers ---

/// validate_email
///
/// Structural email check: non-empty local part and domain around a single
/// `@`, bounded total length. Full RFC validation is deliberately out of
/// scope; the mailbox is proven by actually mailing it.
pub fn validate_email(email: &str) -> ApiResult<()> {
    const MAX_LENGTH: usize = 254;

    if email.is_empty() || email.len() > MAX_LENGTH {
        return Err(ApiError::Validation("Please enter a valid email".into()));
    }

    let at_pos = email
        .find('@')
        .ok_or_else(|| ApiError::Validation("Please enter a valid email".into()))?;

    if at_pos == 0 || at_pos == email.len() - 1 {
        return Err(ApiError::Validation("Please enter a valid email".into()));
    }

    Ok(())
}

/// validate_password
///
/// Registration-time strength check.
pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(
            "Please enter a strong password".into(),
        ));
    }
    Ok(())
}

/// hash_password
///
/// Hashes a password with Argon2id and a fresh random salt, producing a
/// self-describing PHC string.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// verify_password
///
/// Verifies a candidate password against a stored PHC hash. Both a corrupt
/// hash and a mismatch surface as `InvalidCredential`.
pub fn verify_password(password: &str, hash: &str) -> ApiResult<()> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| ApiError::InvalidCredential)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredential)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(validate_email("shopper@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@missing-local.com").is_err());
        assert!(validate_email("missing-domain@").is_err());
    }

    #[test]
    fn password_validation() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
        // Exactly the minimum is accepted.
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(verify_password("wrong password", &hash).is_err());
    }

    #[test]
    fn token_round_trip_preserves_subject_and_role() {
        let secret = "unit-test-secret";
        let id = Uuid::new_v4();

        let token = issue_token(&id.to_string(), ROLE_USER, secret).unwrap();
        let claims = decode_claims(&token, secret).unwrap();

        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, ROLE_USER);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = issue_token("subject", ROLE_ADMIN, "secret-a").unwrap();
        assert!(decode_claims(&token, "secret-b").is_err());
    }
}
