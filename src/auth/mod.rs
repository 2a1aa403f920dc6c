use actix_web::HttpRequest;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::Store;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: i64,    // expiration timestamp
    pub iat: i64,    // issued at
}

pub struct AuthService {
    jwt_secret: String,
    store: Arc<Store>,
}

impl AuthService {
    pub fn new(jwt_secret: String, store: Arc<Store>) -> Self {
        Self { jwt_secret, store }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, 10)
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(password, hash)
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(7);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
    }

    /// Validate a JWT token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Resolve the bearer token on a request into the acting user, or None.
    ///
    /// Operations receive the result inside a `Context`; a missing or
    /// invalid token is not an HTTP-level rejection here, it surfaces as
    /// `Unauthenticated` from whichever operation required a principal.
    pub fn authenticate(&self, req: &HttpRequest) -> Context {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        let current_user = token
            .and_then(|t| self.validate_token(t).ok())
            .and_then(|claims| self.store.get_user(&claims.sub).ok())
            .map(|user| AuthUser {
                user_id: user.id,
                name: user.name,
                username: user.username,
            });

        Context { current_user }
    }
}

/// The authenticated principal for the active request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub name: String,
    pub username: String,
}

/// Per-request context passed into every operation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub current_user: Option<AuthUser>,
}

impl Context {
    pub fn authenticated(user: AuthUser) -> Self {
        Self {
            current_user: Some(user),
        }
    }

    pub fn anonymous() -> Self {
        Self { current_user: None }
    }

    pub fn viewer_id(&self) -> Option<&str> {
        self.current_user.as_ref().map(|u| u.user_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_auth_service() -> AuthService {
        let store = Store::in_memory().unwrap();
        AuthService::new("test_secret".to_string(), Arc::new(store))
    }

    #[test]
    fn test_password_hashing() {
        let auth = create_test_auth_service();
        let password = "my_secure_password";

        let hash = auth.hash_password(password).unwrap();
        assert!(auth.verify_password(password, &hash).unwrap());
        assert!(!auth.verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_jwt_token() {
        let auth = create_test_auth_service();
        let user_id = "user_123";

        let token = auth.generate_token(user_id).unwrap();
        let claims = auth.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let auth = create_test_auth_service();
        assert!(auth.validate_token("not-a-token").is_err());

        let other = AuthService::new("other_secret".to_string(), Arc::new(Store::in_memory().unwrap()));
        let token = other.generate_token("user_123").unwrap();
        assert!(auth.validate_token(&token).is_err());
    }

    #[test]
    fn test_context_viewer_id() {
        let ctx = Context::anonymous();
        assert!(ctx.viewer_id().is_none());

        let ctx = Context::authenticated(AuthUser {
            user_id: "u1".to_string(),
            name: "Alice".to_string(),
            username: "alice".to_string(),
        });
        assert_eq!(ctx.viewer_id(), Some("u1"));
    }
}
