//! Core library for jobboard.
//!
//! - `auth`: the persisted session store and the auth service that owns the
//!   session lifecycle (hydrate, login, register, logout, expiry)
//! - `api`: the REST client with its request/response pipeline
//! - `models`: job offers and applications returned by the API
//! - `config`: on-disk configuration and resolved client settings

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ApiEvent, ErrorCategory};
pub use auth::{
    AuthError, AuthEvent, AuthService, AuthState, FileStorage, LogoutReason, MemoryStorage,
    RegisterRequest, RegisteredAccount, Role, Session, SessionContext, SessionProvider,
    SessionStore, Storage, StoreError,
};
pub use config::{ClientConfig, Config, ExpiryPolicy};
