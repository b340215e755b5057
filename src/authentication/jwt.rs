use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    constants::SESSION_LIFETIME_HOURS,
    database::{
        error::Error,
        schema::{Id, User},
    },
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: Id,
    pub username: String,
    iat: i64,
    exp: i64,
}

impl SessionClaims {
    pub fn new(user: &User, lifetime: Duration) -> Self {
        let now = Utc::now();

        Self {
            user_id: user.id,
            username: user.username.to_owned(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp < Utc::now().timestamp()
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: Id,
}

impl From<SessionClaims> for Session {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.user_id,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::Unauthorized(String::from("Invalid signing key")))
}

pub fn sign_claims(claims: &SessionClaims, secret: &str) -> Result<String, Error> {
    let key = signing_key(secret)?;

    claims
        .sign_with_key(&key)
        .map_err(|_| Error::Unauthorized(String::from("Could not sign token")))
}

pub fn generate_session(user: &User, secret: &str) -> Result<String, Error> {
    let claims = SessionClaims::new(user, Duration::hours(SESSION_LIFETIME_HOURS));
    sign_claims(&claims, secret)
}

pub fn verify_session(token: &str, secret: &str) -> Result<SessionClaims, Error> {
    let key = signing_key(secret)?;

    let claims: SessionClaims = token
        .verify_with_key(&key)
        .map_err(|_| Error::Unauthorized(String::from("Invalid token")))?;
    if claims.is_expired() {
        return Err(Error::Unauthorized(String::from("Token expired")));
    }

    Ok(claims)
}
