#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use jobboard_core::{AuthService, ClientConfig, MemoryStorage, Role, Session, SessionStore};
use serde_json::{json, Value};

/// Client settings pointed at a mock server, with fast retries.
pub fn test_config(base_url: &str) -> ClientConfig {
    ClientConfig::new(base_url)
        .with_timeout(Duration::from_secs(2))
        .with_retries(2, Duration::from_millis(10))
}

pub fn alice_payload() -> Value {
    json!({
        "username": "alice",
        "role": "candidate",
        "access": "tok123",
        "refresh": "ref456",
        "id": 1
    })
}

pub fn alice() -> Session {
    Session::new("alice", Role::Candidate, Some("tok123".into()))
}

/// Auth service over fresh in-memory storage, plus a store view of that storage.
pub fn auth_service(config: &ClientConfig) -> (Arc<AuthService>, SessionStore) {
    let storage = Arc::new(MemoryStorage::new());
    let store = SessionStore::new(storage.clone());
    let service = AuthService::new(config, storage).expect("Failed to build auth service");
    (Arc::new(service), store)
}

/// Auth service hydrated from a previously saved session.
pub fn auth_service_with(config: &ClientConfig, session: &Session) -> (Arc<AuthService>, SessionStore) {
    let storage = Arc::new(MemoryStorage::new());
    let store = SessionStore::new(storage.clone());
    store.save(session).expect("Failed to seed session");
    let service = AuthService::new(config, storage).expect("Failed to build auth service");
    (Arc::new(service), store)
}
