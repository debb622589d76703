//! Exclusive backend access for inference requests.
//!
//! The backend context is not reentrant, so it sits behind a single async
//! mutex. [`SessionManager::acquire`] waits for the owned lock guard; holding
//! the returned [`SessionGuard`] is the right to generate, and dropping it
//! (normal return, error, or client disconnect) hands the backend back.

use std::sync::Arc;

use dryad_engine::InferenceBackend;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Owns the backend and serializes generation over it.
pub struct SessionManager {
    backend: Arc<Mutex<Box<dyn InferenceBackend>>>,
}

/// A held backend lock plus the cancellation token for the session using it.
pub struct SessionGuard {
    session_id: Uuid,
    cancel: CancellationToken,
    backend: OwnedMutexGuard<Box<dyn InferenceBackend>>,
}

impl SessionGuard {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Get a clone of the cancellation token to check in decode loops.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn backend_mut(&mut self) -> &mut dyn InferenceBackend {
        &mut **self.backend
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // Anything still watching this session's token should stop.
        self.cancel.cancel();
        tracing::debug!(session_id = %self.session_id, "session released");
    }
}

impl SessionManager {
    pub fn new(backend: Box<dyn InferenceBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend: Arc::new(Mutex::new(backend)),
        })
    }

    /// Wait until the backend is free and take it.
    pub async fn acquire(&self) -> SessionGuard {
        let backend = Arc::clone(&self.backend).lock_owned().await;
        let session_id = Uuid::new_v4();
        tracing::debug!(%session_id, "session acquired");
        SessionGuard {
            session_id,
            cancel: CancellationToken::new(),
            backend,
        }
    }

    /// Take the backend only if nobody holds it.
    pub fn try_acquire(&self) -> Option<SessionGuard> {
        let backend = Arc::clone(&self.backend).try_lock_owned().ok()?;
        Some(SessionGuard {
            session_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            backend,
        })
    }

    /// Whether a session currently holds the backend.
    pub fn is_busy(&self) -> bool {
        self.backend.try_lock().is_err()
    }
}
