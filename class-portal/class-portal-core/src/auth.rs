//! Admin login and bearer-token verification.

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{PortalError, Result};

pub const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60); // 24 hours

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Claims>;
}

/// The single admin account, held in process configuration.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct Hs256Verifier {
    key: DecodingKey,
}

impl Hs256Verifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl TokenVerifier for Hs256Verifier {
    async fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<Claims>(token, &self.key, &validation)
            .ok()
            .map(|d| d.claims)
    }
}

/// Checks login attempts against the configured admin account and signs
/// tokens for successful ones.
pub struct TokenIssuer {
    credentials: AdminCredentials,
    key: EncodingKey,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(credentials: AdminCredentials, secret: &str) -> Self {
        Self {
            credentials,
            key: EncodingKey::from_secret(secret.as_bytes()),
            lifetime: TOKEN_LIFETIME,
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let user_ok = constant_time_eq(username.as_bytes(), self.credentials.username.as_bytes());
        let pass_ok = constant_time_eq(password.as_bytes(), self.credentials.password.as_bytes());
        if !(user_ok && pass_ok) {
            return Err(PortalError::Unauthorized);
        }
        self.issue(username)
    }

    fn issue(&self, subject: &str) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(anyhow::Error::from)?
            .as_secs();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.lifetime.as_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| PortalError::Storage(e.into()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
