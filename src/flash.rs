//! One-shot messages carried to the next rendered page in a cookie.

use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, response::Response};
use base64ct::{Base64UrlUnpadded, Encoding};
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::SessionConfig, web};

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

/// Messages left by the previous response. Never rejects; an unreadable cookie
/// yields no messages.
#[derive(Debug, Default, Clone)]
pub struct Flash(pub Vec<FlashMessage>);

impl Flash {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cookies to send with a page that displayed these messages.
    pub fn consumed(&self) -> Vec<Cookie<'static>> {
        if self.is_empty() {
            Vec::new()
        } else {
            vec![web::removal_cookie(FLASH_COOKIE)]
        }
    }

    fn decode(raw: &str) -> Option<Vec<FlashMessage>> {
        let bytes = Base64UrlUnpadded::decode_vec(raw).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn encode(messages: &[FlashMessage]) -> String {
        let json = serde_json::to_vec(messages).unwrap_or_default();
        Base64UrlUnpadded::encode_string(&json)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let messages = web::read_cookie(&parts.headers, FLASH_COOKIE)
            .and_then(|raw| {
                let decoded = Flash::decode(&raw);
                if decoded.is_none() {
                    debug!("discarding unreadable flash cookie");
                }
                decoded
            })
            .unwrap_or_default();
        Ok(Flash(messages))
    }
}

/// Carries `messages`; `Secure` follows the session cookie setting.
pub fn flash_cookie(session: &SessionConfig, messages: &[FlashMessage]) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, Flash::encode(messages)))
        .path("/")
        .http_only(true)
        .secure(session.secure)
        .same_site(SameSite::Lax)
        .build()
}

/// `302` to `location` leaving one message for the next page.
pub fn redirect_with(
    session: &SessionConfig,
    location: &str,
    level: Level,
    text: impl Into<String>,
) -> Response {
    let message = FlashMessage {
        level,
        text: text.into(),
    };
    web::found_with(location, vec![flash_cookie(session, &[message])])
}
