//! Application state and configuration.

use std::sync::Arc;

use dryad_engine::InferenceBackend;

use crate::session_manager::SessionManager;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Exclusive access to the backend.
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(backend: impl InferenceBackend + 'static, config: ServerConfig) -> Self {
        Self {
            config,
            sessions: SessionManager::new(Box::new(backend)),
        }
    }
}

/// Server configuration parameters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Model name to report in API responses.
    pub model_name: String,
    /// `owned_by` field of the model card.
    pub owned_by: String,
    /// Maximum tokens to generate when the request names none.
    pub max_tokens: usize,
    /// Temperature used when the request names none.
    pub default_temperature: f32,
    /// Host and port advertised by the service discovery document.
    pub host: String,
    pub port: u16,
    /// Mount the `/v1` OpenAI routes.
    pub serve_openai: bool,
}

impl ServerConfig {
    pub fn openai_base_url(&self) -> String {
        format!("http://{}:{}/v1", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_name: "dryad-mock".to_string(),
            owned_by: "dryad".to_string(),
            max_tokens: 256,
            default_temperature: 0.7,
            host: "0.0.0.0".to_string(),
            port: 8000,
            serve_openai: true,
        }
    }
}
