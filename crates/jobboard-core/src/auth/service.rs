//! Auth service: the single writer of session state.
//!
//! State is either `Anonymous` or `Authenticated(session)`. It is hydrated
//! from the session store when the service is built, so consumers never see a
//! pre-hydration state.
//!
//! Logins take increasing tickets. A successful login records its ticket as
//! the newest committed one, and `logout` and session expiry raise that mark
//! past every ticket issued so far. A login whose ticket is not newer than
//! the mark is dropped instead of overwriting newer state. Failed logins
//! leave the mark alone.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, ApiEvent};
use crate::config::{ClientConfig, ExpiryPolicy};

use super::context::{AuthState, SessionContext};
use super::session::{Role, Session};
use super::store::{SessionStore, Storage, StoreError};

pub const LOGIN_PATH: &str = "/accounts/login/";
pub const REGISTER_PATH: &str = "/accounts/register/";

/// Buffered auth events per subscriber
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to persist session: {0}")]
    Store(#[from] StoreError),

    #[error("Login superseded by a newer login or logout")]
    Superseded,

    #[error("Invalid session payload: {0}")]
    InvalidPayload(String),
}

impl AuthError {
    /// The API error behind this failure, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            AuthError::Api(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    UserRequested,
    Expired,
}

/// Notifications for the view layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    LoggedIn { username: String },
    /// An authenticated request was rejected and the policy kept the session
    SessionExpired,
    /// The session is gone; show the login entry point
    RedirectToLogin { reason: LogoutReason },
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// New-account payload for the registration endpoint.
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Created-account payload returned by the registration endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisteredAccount {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Login ordering guard.
#[derive(Debug, Default)]
struct Generations {
    /// Last ticket handed to a login
    issued: u64,
    /// Tickets up to here are stale
    committed: u64,
}

pub struct AuthService {
    store: SessionStore,
    client: ApiClient,
    state: watch::Sender<AuthState>,
    events: broadcast::Sender<AuthEvent>,
    generations: Mutex<Generations>,
    expiry_policy: ExpiryPolicy,
}

impl AuthService {
    /// Build the service and hydrate it from `storage`.
    pub fn new(config: &ClientConfig, storage: Arc<dyn Storage>) -> Result<Self, ApiError> {
        let store = SessionStore::new(storage);
        let initial = match store.load() {
            Some(session) => {
                info!(username = %session.username, "Restored session");
                AuthState::Authenticated(session)
            }
            None => {
                debug!("No stored session");
                AuthState::Anonymous
            }
        };

        let (state, rx) = watch::channel(initial);
        let client = ApiClient::new(config, Arc::new(SessionContext::new(rx)))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            store,
            client,
            state,
            events,
            generations: Mutex::new(Generations::default()),
            expiry_policy: config.expiry_policy,
        })
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Read-only handle for consumers
    pub fn context(&self) -> SessionContext {
        SessionContext::new(self.state.subscribe())
    }

    /// API client that authenticates with this service's session
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Log in and make the returned payload the current session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let ticket = {
            let mut generations = self.lock_generations();
            generations.issued += 1;
            generations.issued
        };
        debug!(username, ticket, "Logging in");

        let payload: Value = self
            .client
            .post_public(LOGIN_PATH, &LoginRequest { username, password })
            .await
            .map_err(|e| {
                warn!(username, error = %e, "Login failed");
                e
            })?;

        let session = Session::from_payload(payload, username)
            .map_err(|e| AuthError::InvalidPayload(e.to_string()))?;

        {
            let mut generations = self.lock_generations();
            if ticket <= generations.committed {
                warn!(
                    username,
                    ticket,
                    committed = generations.committed,
                    "Discarding superseded login"
                );
                return Err(AuthError::Superseded);
            }
            self.store.save(&session)?;
            generations.committed = ticket;
            self.state
                .send_replace(AuthState::Authenticated(session.clone()));
        }

        info!(username = %session.username, role = %session.role, "Login successful");
        let _ = self.events.send(AuthEvent::LoggedIn {
            username: session.username.clone(),
        });
        Ok(session)
    }

    /// Create an account. The caller still has to log in afterwards.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisteredAccount, AuthError> {
        debug!(username = %request.username, role = %request.role, "Registering account");
        let account: RegisteredAccount = self
            .client
            .post_public(REGISTER_PATH, request)
            .await
            .map_err(|e| {
                warn!(username = %request.username, error = %e, "Registration failed");
                e
            })?;
        info!(username = %request.username, "Account registered");
        Ok(account)
    }

    /// Drop the session from memory and storage and redirect to login.
    ///
    /// In-memory state is cleared even if storage fails; the storage error is
    /// still returned.
    pub fn logout(&self) -> Result<(), AuthError> {
        let cleared = self.end_session(LogoutReason::UserRequested);
        info!("Logged out");
        cleared
    }

    fn end_session(&self, reason: LogoutReason) -> Result<(), AuthError> {
        let cleared = {
            let mut generations = self.lock_generations();
            generations.committed = generations.issued;
            let cleared = self.store.clear();
            self.state.send_replace(AuthState::Anonymous);
            cleared
        };
        let _ = self.events.send(AuthEvent::RedirectToLogin { reason });
        cleared.map_err(AuthError::from)
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Apply the expiry policy to a pipeline event. Returns `true` if the
    /// session was ended.
    pub fn handle_api_event(&self, event: &ApiEvent) -> bool {
        let ApiEvent::Unauthorized { path, token } = event;
        let Some(token) = token else {
            return false;
        };

        // Ignore rejections of a token that is no longer current
        let current = self.session();
        if current.as_ref().and_then(Session::token) != Some(token.as_str()) {
            debug!(path = %path, "Ignoring 401 for a stale token");
            return false;
        }

        match self.expiry_policy {
            ExpiryPolicy::Notify => {
                warn!(path = %path, "Session expired");
                let _ = self.events.send(AuthEvent::SessionExpired);
                false
            }
            ExpiryPolicy::Logout => {
                warn!(path = %path, "Session expired, logging out");
                if let Err(e) = self.end_session(LogoutReason::Expired) {
                    warn!(error = %e, "Failed to clear expired session");
                }
                true
            }
        }
    }

    /// Apply the expiry policy to every pipeline event on a background task.
    ///
    /// The task holds only a weak reference and stops once the service is
    /// dropped.
    pub fn spawn_expiry_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.client.subscribe();
        let service: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Some(service) = service.upgrade() else {
                            break;
                        };
                        service.handle_api_event(&event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Expiry watcher fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn lock_generations(&self) -> MutexGuard<'_, Generations> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
