//! HTTP request handlers for API endpoints.

pub mod completions;
pub mod health;
pub mod models;
pub mod well_known;

pub use completions::handle_completion;
pub use health::handle_health;
pub use models::handle_models;
pub use well_known::handle_serviceinfo;
