pub mod auth;
pub mod error;
pub mod middleware;
pub mod profile;
pub mod projects;
pub mod relations;
pub mod routes;

pub use auth::{AppState, AppStateInner};
