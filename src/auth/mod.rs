use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{RankerError, Result};
use crate::users::{UserRecord, UserStore, STATUS_ACTIVE};

pub const SESSION_COOKIE: &str = "auth_token";

const BCRYPT_COST: u32 = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub exp: i64,
}

/// Identity handed to downstream calls. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub role: String,
    pub status: String,
    pub locale: String,
}

pub struct AuthGate {
    users: Arc<UserStore>,
    secret: String,
    ttl_days: i64,
}

impl AuthGate {
    pub fn new(users: Arc<UserStore>, secret: impl Into<String>, ttl_days: i64) -> Self {
        Self {
            users,
            secret: secret.into(),
            ttl_days,
        }
    }

    /// Credential check only. Suspension is not checked here; the original
    /// service lets a suspended user log in and rejects every authenticated
    /// call instead.
    pub async fn login(&self, email: &str, password: &str) -> Result<(AuthUser, String)> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| RankerError::Unauthorized("invalid credentials".to_string()))?;
        if !verify_password(password, &user.password_hash)? {
            return Err(RankerError::Unauthorized("invalid credentials".to_string()));
        }
        let token = self.issue(user.id)?;
        Ok((sanitize(&user), token))
    }

    /// Resolves a session token to an active user. A missing token is
    /// `Unauthorized`; a bad token or a non-active account is `Forbidden`.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthUser> {
        let token =
            token.ok_or_else(|| RankerError::Unauthorized("missing session".to_string()))?;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| RankerError::Forbidden("invalid session".to_string()))?;

        let user = self
            .users
            .find_by_id(data.claims.sub)
            .await?
            .filter(|user| user.status == STATUS_ACTIVE)
            .ok_or_else(|| RankerError::Forbidden("access denied".to_string()))?;
        Ok(sanitize(&user))
    }

    pub fn ttl_days(&self) -> i64 {
        self.ttl_days
    }

    fn issue(&self, user_id: i32) -> Result<String> {
        let exp = time::OffsetDateTime::now_utc().unix_timestamp()
            + self.ttl_days * 24 * 60 * 60;
        let claims = Claims { sub: user_id, exp };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| RankerError::Runtime(e.to_string()))
    }
}

fn sanitize(user: &UserRecord) -> AuthUser {
    AuthUser {
        id: user.id,
        email: user.email.clone(),
        role: user.role.clone(),
        status: user.status.clone(),
        locale: user.locale.clone(),
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| RankerError::Runtime(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    bcrypt::verify(password, password_hash).map_err(|e| RankerError::Runtime(e.to_string()))
}

pub fn session_cookie(token: String, ttl_days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(ttl_days))
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .build()
}
