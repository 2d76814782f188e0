//! Browser-session abstraction driven by the portal flow.
//!
//! A session is one browser plus one page, owned by a single in-flight lookup
//! and closed by it on every exit path. Sessions are never pooled.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::errors::UpstreamError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("page interaction failed: {0}")]
    Interaction(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl From<SessionError> for UpstreamError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Timeout(msg) => UpstreamError::Timeout(msg),
            SessionError::ElementNotFound(msg) => UpstreamError::StructuralChange(msg),
            other => UpstreamError::UpstreamFailure(other.to_string()),
        }
    }
}

/// A single browser page driven through the portal's search form.
#[async_trait]
pub trait PortalSession: Send {
    /// Navigate to a URL and wait for it to load.
    async fn goto(&mut self, url: &str) -> Result<(), SessionError>;

    /// Whether an element matching `selector` currently exists.
    async fn has_element(&mut self, selector: &str) -> Result<bool, SessionError>;

    /// Type `text` into the element matching `selector`.
    async fn type_into(&mut self, selector: &str, text: &str) -> Result<(), SessionError>;

    /// Click the element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), SessionError>;

    /// Current page HTML.
    async fn html(&mut self) -> Result<String, SessionError>;

    /// Close the page and its browser.
    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// Creates a fresh, exclusively owned session per lookup.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PortalSession>, SessionError>;
}

/// How long closing a session may take before it is abandoned.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns a launched session until it is closed.
///
/// `close` shuts the session down in place. If the guard is dropped instead
/// (the lookup future was cancelled, or the flow panicked), the close is
/// spawned onto the current runtime.
pub struct SessionGuard {
    session: Option<Box<dyn PortalSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn PortalSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&mut self) -> Result<&mut dyn PortalSession, SessionError> {
        match self.session.as_mut() {
            Some(session) => Ok(&mut **session),
            None => Err(SessionError::Interaction("session already closed".to_string())),
        }
    }

    /// Closes the session, waiting at most [`CLOSE_TIMEOUT`].
    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            close_session(session).await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("[CREA] Lookup abandoned, closing session in background");
                handle.spawn(close_session(session));
            }
            Err(_) => tracing::warn!("[CREA] No runtime to close abandoned session"),
        }
    }
}

async fn close_session(session: Box<dyn PortalSession>) {
    match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => tracing::debug!("[CREA] Session closed"),
        Ok(Err(e)) => tracing::warn!("[CREA] Session close failed: {}", e),
        Err(_) => tracing::warn!("[CREA] Session close timed out"),
    }
}
