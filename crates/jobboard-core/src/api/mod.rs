//! REST API client module for the job board backend.
//!
//! This module provides the `ApiClient` for calling the backend. Every
//! request passes through an outgoing stage that attaches the bearer token
//! from an injected `SessionProvider`, and an incoming stage that classifies
//! failures, logs them and re-raises them unchanged.

pub mod client;
pub mod error;
pub mod resources;

pub use client::{ApiClient, ApiEvent};
pub use error::{ApiError, ErrorCategory};
