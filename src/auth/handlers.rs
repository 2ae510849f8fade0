use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, NextQuery, SignupForm},
        events::client_ip,
        jwt::{MaybeUser, LOGIN_PATH},
        services::{authenticate, check_signup, hash_password},
    },
    error::AppResult,
    flash::Flash,
    state::AppState,
    templates::{page_context, render},
    web,
};

const DEFAULT_NEXT: &str = "/polls/";

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(LOGIN_PATH, get(login_page).post(login))
        .route("/accounts/logout/", post(logout))
        .route("/accounts/signup/", get(signup_page).post(signup))
}

fn safe_next(next: Option<&str>) -> &str {
    next.filter(|n| web::is_safe_next(n)).unwrap_or(DEFAULT_NEXT)
}

fn login_form(
    state: &AppState,
    user: &MaybeUser,
    flash: &Flash,
    username: &str,
    next: &str,
    error: Option<&str>,
) -> AppResult<Response> {
    let mut ctx = page_context(user.0.as_ref(), flash);
    ctx.insert("form_error", &error);
    ctx.insert("username", username);
    ctx.insert("next", next);
    let html = render(&state.templates, "accounts/login.html", &ctx)?;
    Ok((web::set_cookies(flash.consumed()), html).into_response())
}

fn signup_form(
    state: &AppState,
    user: &MaybeUser,
    flash: &Flash,
    username: &str,
    error: Option<&str>,
) -> AppResult<Response> {
    let mut ctx = page_context(user.0.as_ref(), flash);
    ctx.insert("form_error", &error);
    ctx.insert("username", username);
    let html = render(&state.templates, "accounts/signup.html", &ctx)?;
    Ok((web::set_cookies(flash.consumed()), html).into_response())
}

#[instrument(skip_all)]
pub async fn login_page(
    State(state): State<AppState>,
    user: MaybeUser,
    flash: Flash,
    Query(q): Query<NextQuery>,
) -> AppResult<Response> {
    let next = safe_next(q.next.as_deref());
    login_form(&state, &user, &flash, "", next, None)
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let username = form.username.trim();
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let next = safe_next(form.next.as_deref());

    let Some(user) = authenticate(state.users.as_ref(), username, &form.password).await? else {
        state.auth_events.login_failed(username, ip);
        return login_form(
            &state,
            &MaybeUser(None),
            &Flash::default(),
            username,
            next,
            Some("Please enter a correct username and password."),
        );
    };

    let token = state.keys.sign(user.id, &user.username)?;
    state.auth_events.logged_in(&user.username, ip);
    Ok(web::found_with(next, vec![state.keys.session_cookie(token)]))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    if let Some(user) = user {
        let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
        state.auth_events.logged_out(&user.username, ip);
    }
    web::found_with(DEFAULT_NEXT, vec![state.keys.logout_cookie()])
}

#[instrument(skip_all)]
pub async fn signup_page(
    State(state): State<AppState>,
    user: MaybeUser,
    flash: Flash,
) -> AppResult<Response> {
    signup_form(&state, &user, &flash, "", None)
}

#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let username = form.username.trim();
    let anonymous = MaybeUser(None);
    let no_flash = Flash::default();

    if let Err(msg) = check_signup(username, &form.password, &form.password_confirm) {
        warn!(user = %username, reason = msg, "signup rejected");
        return signup_form(&state, &anonymous, &no_flash, username, Some(msg));
    }

    let hash = hash_password(&form.password)?;
    let Some(user) = state.users.create(username, &hash).await? else {
        warn!(user = %username, "username already taken");
        return signup_form(
            &state,
            &anonymous,
            &no_flash,
            username,
            Some("A user with that username already exists."),
        );
    };

    info!(user_id = %user.id, user = %user.username, "user registered");
    let token = state.keys.sign(user.id, &user.username)?;
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    state.auth_events.logged_in(&user.username, ip);
    Ok(web::found_with(DEFAULT_NEXT, vec![state.keys.session_cookie(token)]))
}
