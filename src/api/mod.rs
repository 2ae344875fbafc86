//! HTTP API: routing, task CRUD handlers, and chat handlers.

pub mod chat;
pub mod routes;
pub mod tasks;

pub use routes::{serve, AppState};
