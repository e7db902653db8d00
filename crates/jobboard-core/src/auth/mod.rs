//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `Session`: the persisted record of the signed-in user and access token
//! - `SessionStore`: load/save/clear of that record over a `Storage` backend
//! - `AuthService`: the single writer of session state (login, register, logout)
//! - `SessionContext`: read-only view of the auth state handed to consumers

pub mod context;
pub mod service;
pub mod session;
pub mod store;

pub use context::{AuthState, SessionContext, SessionProvider};
pub use service::{
    AuthError, AuthEvent, AuthService, LogoutReason, RegisterRequest, RegisteredAccount,
};
pub use session::{Role, Session};
pub use store::{FileStorage, MemoryStorage, SessionStore, Storage, StoreError};
