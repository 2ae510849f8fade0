use crate::state::AppState;
use axum::Router;

mod dto;
pub mod events;
pub mod handlers;
pub mod jwt;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use jwt::{AuthUser, JwtKeys, MaybeUser};

pub fn router() -> Router<AppState> {
    handlers::account_routes()
}
