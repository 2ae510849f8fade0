//! Small HTTP helpers shared by the page handlers: 302 redirects and cookies.

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
};
use cookie::Cookie;

/// `302 Found` to `location`. `axum::response::Redirect` only offers 303/307/308.
pub fn found(location: &str) -> Response {
    found_with(location, Vec::new())
}

pub fn found_with(location: &str, cookies: Vec<Cookie<'static>>) -> Response {
    let location =
        HeaderValue::from_str(location).unwrap_or_else(|_| HeaderValue::from_static("/"));
    (
        StatusCode::FOUND,
        set_cookies(cookies),
        [(header::LOCATION, location)],
    )
        .into_response()
}

pub fn set_cookies(cookies: Vec<Cookie<'static>>) -> AppendHeaders<Vec<(HeaderName, HeaderValue)>> {
    AppendHeaders(
        cookies
            .into_iter()
            .filter_map(|c| HeaderValue::from_str(&c.to_string()).ok())
            .map(|v| (header::SET_COOKIE, v))
            .collect(),
    )
}

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw.to_owned()))
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_owned())
}

/// A cookie that makes the browser forget `name`.
pub fn removal_cookie(name: &str) -> Cookie<'static> {
    let mut c = Cookie::build((name.to_owned(), "")).path("/").build();
    c.make_removal();
    c
}

/// Only site-relative paths are accepted as post-login destinations.
pub fn is_safe_next(next: &str) -> bool {
    next.starts_with('/')
        && !next.starts_with("//")
        && next
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/-_.~".contains(c))
}
