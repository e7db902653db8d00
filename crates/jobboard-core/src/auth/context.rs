use tokio::sync::watch;

use super::session::Session;
use super::store::StoreError;

/// Observable authentication state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated(Session),
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            AuthState::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Source of the bearer token the API client attaches to outgoing requests.
///
/// An `Err` rejects the request instead of sending it unauthenticated.
pub trait SessionProvider: Send + Sync {
    fn access_token(&self) -> Result<Option<String>, StoreError>;
}

/// Read-only handle on the auth service's state.
///
/// Cloned freely into every consumer; only `AuthService` can change what it
/// observes.
#[derive(Clone)]
pub struct SessionContext {
    rx: watch::Receiver<AuthState>,
}

impl SessionContext {
    pub(crate) fn new(rx: watch::Receiver<AuthState>) -> Self {
        Self { rx }
    }

    pub fn state(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.rx.borrow().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated()
    }

    /// Wait for the next state change. Returns `false` once the auth service
    /// is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

impl SessionProvider for SessionContext {
    fn access_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .rx
            .borrow()
            .session()
            .and_then(|s| s.token().map(str::to_string)))
    }
}
