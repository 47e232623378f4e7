use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod jwt;
pub mod password;

pub use jwt::AuthUser;

pub fn router() -> Router<AppState> {
    handlers::session_routes()
}
