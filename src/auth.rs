use axum::http::HeaderMap;
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Claims carried by bearer tokens minted by the identity service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub username: String,
    #[serde(default)]
    pub is_staff: bool,
    pub exp: usize,
}

/// An authenticated user as seen by handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

/// Caller identity resolved for every guarded request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User(AuthUser),
}

impl Identity {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Identity::User(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|user| user.is_admin)
    }

    /// Returns the user or a 401 for anonymous callers
    pub fn require_user(&self) -> AppResult<&AuthUser> {
        self.user().ok_or(AppError::NotAuthenticated)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            is_admin: claims.is_staff,
        }
    }
}

/// Verifies HS256 bearer tokens against the configured secret
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> AppResult<AuthUser> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            AppError::InvalidToken
        })?;
        Ok(data.claims.into())
    }

    /// Anonymous without an Authorization header, otherwise the verified user
    pub fn identify(&self, headers: &HeaderMap) -> AppResult<Identity> {
        if !headers.contains_key(axum::http::header::AUTHORIZATION) {
            return Ok(Identity::Anonymous);
        }

        let Authorization(bearer) = headers
            .typed_get::<Authorization<Bearer>>()
            .ok_or(AppError::InvalidToken)?;

        self.verify(bearer.token()).map(Identity::User)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(exp_offset: i64) -> Claims {
        Claims {
            sub: 7,
            username: "alice".to_string(),
            is_staff: false,
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(verifier.identify(&HeaderMap::new()).unwrap(), Identity::Anonymous);
    }

    #[test]
    fn test_valid_token_yields_user() {
        let verifier = TokenVerifier::new(SECRET);
        let identity = verifier.identify(&bearer(&token(&claims(3600), SECRET))).unwrap();
        let user = identity.user().unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.username, "alice");
        assert!(!identity.is_admin());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        let result = verifier.identify(&bearer(&token(&claims(3600), "other")));
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        let result = verifier.identify(&bearer(&token(&claims(-3600), SECRET)));
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_non_bearer_scheme_is_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic YWxpY2U6cHc="),
        );
        assert!(matches!(verifier.identify(&headers), Err(AppError::InvalidToken)));
    }
}
