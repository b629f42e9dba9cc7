//! Thin axum front-end exposing the HTTP surface over the engines in
//! `satellite-engine`.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
