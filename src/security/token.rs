//! Signed session tokens and the `token` cookie that carries them.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Mode, error::ApiError, model::identity::Identity};

pub const TOKEN_COOKIE: &str = "token";

const RESERVED_CLAIMS: [&str; 2] = ["iat", "exp"];

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    identity: Identity,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: TimeDelta,
    mode: Mode,
}

impl TokenService {
    pub fn new(secret: &str, mode: Mode) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: TimeDelta::days(1),
            mode,
        }
    }

    /// Signs the identity into an HS256 token valid for one day.
    pub fn issue(&self, identity: &Identity) -> Result<String, ApiError> {
        let mut identity = identity.clone();
        for claim in RESERVED_CLAIMS {
            identity.profile.remove(claim);
        }

        let now = Utc::now();
        let claims = Claims {
            identity,
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Token encoding failed: {e}")))
    }

    /// Checks signature and expiry, returning the identity the token was issued for.
    pub fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims.identity)
            .map_err(|_| ApiError::Unauthorized)
    }

    /// The cookie holding `token`. Cross-site and secure in production, strict otherwise.
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        let production = self.mode == Mode::Production;
        Cookie::build((TOKEN_COOKIE, token))
            .http_only(true)
            .path("/")
            .secure(production)
            .same_site(if production {
                SameSite::None
            } else {
                SameSite::Strict
            })
            .build()
    }

    /// A cookie that makes the browser drop the token.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.cookie(String::new());
        cookie.make_removal();
        cookie
    }

    #[cfg(test)]
    pub fn with_lifetime(mut self, lifetime: TimeDelta) -> Self {
        self.lifetime = lifetime;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", Mode::Development)
    }

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let mut identity = Identity::new("ada@example.com");
        identity.profile.insert("name".into(), json!("Ada"));
        identity.profile.insert("exp".into(), json!(1));

        let token = service().issue(&identity).unwrap();
        let verified = service().verify(&token).unwrap();

        assert_eq!(verified.email, "ada@example.com");
        assert_eq!(verified.profile.get("name"), Some(&json!("Ada")));
        assert!(!verified.profile.contains_key("exp"));
    }

    #[test]
    fn tampered_token_is_unauthorized() {
        let token = service().issue(&Identity::new("ada@example.com")).unwrap();
        let other = TokenService::new("another-secret", Mode::Development);

        assert!(matches!(other.verify(&token), Err(ApiError::Unauthorized)));
        assert!(matches!(
            service().verify(&format!("{token}x")),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(service().verify(""), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let expired = service().with_lifetime(TimeDelta::hours(-2));
        let token = expired.issue(&Identity::new("ada@example.com")).unwrap();

        assert!(matches!(service().verify(&token), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn cookie_attributes_follow_mode() {
        let dev = service().cookie("abc".into());
        assert_eq!(dev.http_only(), Some(true));
        assert_eq!(dev.same_site(), Some(SameSite::Strict));
        assert_ne!(dev.secure(), Some(true));

        let prod = TokenService::new("s", Mode::Production).cookie("abc".into());
        assert_eq!(prod.secure(), Some(true));
        assert_eq!(prod.same_site(), Some(SameSite::None));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = service().removal_cookie();
        assert_eq!(cookie.name(), TOKEN_COOKIE);
        assert_eq!(cookie.value(), "");
        assert!(cookie.to_string().contains("Max-Age=0"));
    }
}
