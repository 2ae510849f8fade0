use std::{convert::Infallible, time::Duration};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, Method},
    response::Response,
};
use cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::{AppConfig, MAX_TTL_MINUTES},
    state::AppState,
    web,
};

pub const LOGIN_PATH: &str = "/accounts/login/";

/// Session token payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

/// Signing material plus the cookie the token travels in.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
    pub cookie_name: String,
    pub secure_cookie: bool,
}

impl From<&AppConfig> for JwtKeys {
    fn from(config: &AppConfig) -> Self {
        let jwt = &config.jwt;
        Self {
            encoding: EncodingKey::from_secret(jwt.secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt.secret.as_bytes()),
            issuer: jwt.issuer.clone(),
            audience: jwt.audience.clone(),
            ttl: Duration::from_secs(jwt.ttl_minutes.clamp(1, MAX_TTL_MINUTES) as u64 * 60),
            cookie_name: config.session.cookie_name.clone(),
            secure_cookie: config.session.secure,
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.as_ref().clone()
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid, username: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            username: username.to_owned(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::seconds(self.ttl.as_secs() as i64))
            .build()
    }

    pub fn logout_cookie(&self) -> Cookie<'static> {
        web::removal_cookie(&self.cookie_name)
    }

    /// Token from the session cookie, falling back to `Authorization: Bearer`.
    fn token_from(&self, parts: &Parts) -> Option<String> {
        web::read_cookie(&parts.headers, &self.cookie_name).or_else(|| {
            parts
                .headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_owned)
        })
    }

    fn user_from(&self, parts: &Parts) -> Option<AuthUser> {
        let token = self.token_from(parts)?;
        match self.verify(&token) {
            Ok(claims) => Some(AuthUser {
                id: claims.sub,
                username: claims.username,
            }),
            Err(e) => {
                warn!(error = %e, "invalid or expired session token");
                None
            }
        }
    }
}

/// The signed-in user. Rejects with a `302` to the login page.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// The signed-in user if any; never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

/// Where to come back to after logging in. A form POST returns to the page
/// that holds the form (its parent path).
fn next_for(parts: &Parts) -> Option<String> {
    let path = parts.uri.path();
    let next = if parts.method == Method::GET || parts.method == Method::HEAD {
        path.to_owned()
    } else {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => trimmed[..=idx].to_owned(),
            None => "/".to_owned(),
        }
    };
    web::is_safe_next(&next).then_some(next)
}

pub fn login_url(next: Option<&str>) -> String {
    match next {
        Some(next) => format!("{LOGIN_PATH}?next={next}"),
        None => LOGIN_PATH.to_owned(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let parts: &Parts = parts;
        let keys = JwtKeys::from_ref(state);
        keys.user_from(parts).ok_or_else(|| {
            debug!(path = %parts.uri.path(), "login required");
            web::found(&login_url(next_for(parts).as_deref()))
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeUser(keys.user_from(parts)))
    }
}
