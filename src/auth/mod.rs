use crate::state::AppState;
use axum::Router;

pub mod dto;
pub(crate) mod extractors;
pub mod guard;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod services;
pub mod tokens;

pub fn router() -> Router<AppState> {
    handlers::router()
}
