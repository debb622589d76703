//! # dryad-server
//!
//! OpenAI-compatible HTTP API for dryad.
//!
//! Serves text completions from a single [`InferenceBackend`](dryad_engine::InferenceBackend).
//! Requests take turns on the backend through the [`SessionManager`]; a
//! client that disconnects mid-generation cancels its session.

pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod session_manager;
pub mod state;

pub use error::ServerError;
pub use server::{create_router, run_server};
pub use session_manager::{SessionGuard, SessionManager};
pub use state::{AppState, ServerConfig};
