//! API client for the job board REST API.
//!
//! Requests run through two stages:
//!
//! 1. `prepare` resolves the path against the base URL, sets the default
//!    content type and attaches `Authorization: Bearer <token>` from the
//!    injected `SessionProvider`.
//! 2. `inspect` passes successful responses through untouched and turns
//!    failures into `ApiError`s, logging each one. A 401 is also broadcast as
//!    `ApiEvent::Unauthorized` so the auth service can react to it.
//!
//! Errors are never swallowed: whatever the server (or the transport) said is
//! returned to the caller after it has been logged.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, multipart, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::auth::SessionProvider;
use crate::config::ClientConfig;

use super::ApiError;

/// Default request body encoding
const JSON_CONTENT_TYPE: &str = "application/json";

/// Buffered pipeline events per subscriber before the oldest are dropped
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Signals raised by the response stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiEvent {
    /// The server answered 401. `token` is the bearer token the request
    /// carried, `None` for public or anonymous requests.
    Unauthorized { path: String, token: Option<String> },
}

/// Whether the outgoing stage may attach the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    Session,
    Public,
}

/// Content type set by the outgoing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Body {
    Json,
    /// Left unset so reqwest can write the multipart boundary
    Multipart,
}

/// A request that went through the outgoing stage.
pub(crate) struct Prepared {
    pub(crate) builder: RequestBuilder,
    pub(crate) token: Option<String>,
}

/// API client for the job board backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
    events: broadcast::Sender<ApiEvent>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client reading its bearer token from `session`
    pub fn new(config: &ClientConfig, session: Arc<dyn SessionProvider>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::from_transport)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            session,
            events,
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
        })
    }

    /// Subscribe to pipeline events (401 responses).
    pub fn subscribe(&self) -> broadcast::Receiver<ApiEvent> {
        self.events.subscribe()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Outgoing-request stage.
    pub(crate) fn prepare(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        body: Body,
    ) -> Result<Prepared, ApiError> {
        let mut builder = self.client.request(method, self.url(path));
        if body == Body::Json {
            builder = builder.header(header::CONTENT_TYPE, JSON_CONTENT_TYPE);
        }

        let token = match auth {
            Auth::Session => self.session.access_token().map_err(|e| {
                error!(path, error = %e, "Could not read session, request not sent");
                ApiError::Session(e)
            })?,
            Auth::Public => None,
        };

        if let Some(ref token) = token {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidRequest(format!("invalid bearer token: {}", e)))?;
            value.set_sensitive(true);
            builder = builder.header(header::AUTHORIZATION, value);
        }

        Ok(Prepared { builder, token })
    }

    /// Incoming-response stage.
    async fn inspect(
        &self,
        path: &str,
        token: Option<String>,
        response: Response,
    ) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => {
                warn!(
                    path,
                    authenticated = token.is_some(),
                    "Session expired or credentials rejected"
                );
                // Nobody listening is fine
                let _ = self.events.send(ApiEvent::Unauthorized {
                    path: path.to_string(),
                    token,
                });
            }
            StatusCode::NOT_FOUND => error!(path, "Resource not found"),
            s if s.is_server_error() => {
                error!(path, status = s.as_u16(), "Server error, try again later")
            }
            s => debug!(path, status = s.as_u16(), "Request rejected"),
        }

        Err(ApiError::from_status(status, &body))
    }

    /// Failure with no response from the server.
    fn transport_failure(path: &str, err: reqwest::Error) -> ApiError {
        let err = ApiError::from_transport(err);
        match &err {
            ApiError::Timeout(_) => error!(path, "Network error: request timed out"),
            ApiError::Network(_) => error!(path, error = %err, "Network error: no response from server"),
            _ => error!(path, error = %err, "Request failed before reaching the server"),
        }
        err
    }

    async fn send_once(&self, path: &str, prepared: Prepared) -> Result<Response, ApiError> {
        match prepared.builder.send().await {
            Ok(response) => self.inspect(path, prepared.token, response).await,
            Err(e) => Err(Self::transport_failure(path, e)),
        }
    }

    fn should_retry(err: &ApiError, idempotent: bool) -> bool {
        match err {
            ApiError::RateLimited(_) => true,
            _ => idempotent && err.is_retryable(),
        }
    }

    /// Run a request through both stages, backing off and retrying while the
    /// failure allows it.
    async fn execute<F>(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        attach: F,
    ) -> Result<Response, ApiError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let idempotent = method == Method::GET;
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut prepared = self.prepare(method.clone(), path, auth, Body::Json)?;
            prepared.builder = attach(prepared.builder);

            match self.send_once(path, prepared).await {
                Ok(response) => return Ok(response),
                Err(e) if retries < self.max_retries && Self::should_retry(&e, idempotent) => {
                    retries += 1;
                    warn!(
                        path,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Request failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        let text = response
            .text()
            .await
            .map_err(|e| Self::transport_failure(path, e))?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(path, error = %e, "Failed to parse response");
            ApiError::InvalidResponse(format!("{}: {}", path, e))
        })
    }

    // ===== Verbs =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(Method::GET, path, Auth::Session, |b| b).await?;
        Self::decode(path, response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(Method::POST, path, Auth::Session, |b| b.json(body))
            .await?;
        Self::decode(path, response).await
    }

    /// POST without the session token (login, registration).
    pub async fn post_public<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(Method::POST, path, Auth::Public, |b| b.json(body))
            .await?;
        Self::decode(path, response).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(Method::PUT, path, Auth::Session, |b| b.json(body))
            .await?;
        Self::decode(path, response).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(Method::PATCH, path, Auth::Session, |b| b.json(body))
            .await?;
        Self::decode(path, response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::DELETE, path, Auth::Session, |b| b)
            .await?;
        Ok(())
    }

    /// POST a multipart form (file uploads). Sent once: the form is consumed.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: multipart::Form,
    ) -> Result<T, ApiError> {
        let mut prepared = self.prepare(Method::POST, path, Auth::Session, Body::Multipart)?;
        prepared.builder = prepared.builder.multipart(form);
        let response = self.send_once(path, prepared).await?;
        Self::decode(path, response).await
    }
}
