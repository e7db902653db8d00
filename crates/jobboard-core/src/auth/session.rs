use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Account role as reported by the backend.
///
/// Unknown role strings deserialize to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Recruiter,
    #[default]
    #[serde(other)]
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Recruiter => "recruiter",
            Role::Other => "other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "candidate" => Ok(Role::Candidate),
            "recruiter" => Ok(Role::Recruiter),
            "other" => Ok(Role::Other),
            other => Err(format!("unknown role '{}' (expected candidate or recruiter)", other)),
        }
    }
}

/// Keys owned by the named `Session` fields.
const RESERVED_KEYS: [&str; 3] = ["username", "role", "access"];

/// The signed-in user as returned by the login endpoint.
///
/// Sessions are replaced wholesale, never patched. Any field the server
/// sends beyond `username`, `role` and `access` (`id`, `email`, `refresh`, ...)
/// is kept in `profile` so it survives a save/load cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    // Private so a reserved key can never be written twice on save
    #[serde(flatten)]
    profile: Map<String, Value>,
}

impl Session {
    pub fn new(username: impl Into<String>, role: Role, access: Option<String>) -> Self {
        Self {
            username: username.into(),
            role,
            access,
            profile: Map::new(),
        }
    }

    /// Build a session from a login payload, filling `username` from the
    /// login identifier when the server leaves it out.
    pub fn from_payload(payload: Value, identifier: &str) -> Result<Self, serde_json::Error> {
        let mut session: Session = serde_json::from_value(payload)?;
        if session.username.is_empty() {
            session.username = identifier.to_string();
        }
        Ok(session)
    }

    /// Extra server-supplied fields
    pub fn profile(&self) -> &Map<String, Value> {
        &self.profile
    }

    /// Set an extra profile field. Returns `false` and leaves the session
    /// unchanged for `username`, `role` and `access`.
    pub fn set_profile_field(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return false;
        }
        self.profile.insert(key, value);
        true
    }

    /// A stored session must at least identify its user.
    pub fn is_well_formed(&self) -> bool {
        !self.username.trim().is_empty()
    }

    /// Get the bearer token, if the server issued one
    pub fn token(&self) -> Option<&str> {
        self.access.as_deref().filter(|t| !t.is_empty())
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    pub fn is_candidate(&self) -> bool {
        self.role == Role::Candidate
    }

    pub fn is_recruiter(&self) -> bool {
        self.role == Role::Recruiter
    }

    /// Numeric account id from the profile payload
    pub fn user_id(&self) -> Option<i64> {
        match self.profile.get("id")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.profile.get("email").and_then(Value::as_str)
    }

    /// Name to show in menus: the profile `name` if present, else the username.
    pub fn display_name(&self) -> &str {
        self.profile
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_from_str() {
        assert_eq!("candidate".parse::<Role>(), Ok(Role::Candidate));
        assert_eq!("Recruiter".parse::<Role>(), Ok(Role::Recruiter));
        assert_eq!(" OTHER ".parse::<Role>(), Ok(Role::Other));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_unknown_role_deserializes_to_other() {
        let session: Session =
            serde_json::from_value(json!({"username": "bob", "role": "user"})).unwrap();
        assert_eq!(session.role, Role::Other);
    }

    #[test]
    fn test_profile_fields_survive_round_trip() {
        let payload = json!({
            "username": "alice",
            "role": "candidate",
            "access": "tok123",
            "refresh": "ref456",
            "id": 7,
            "email": "alice@example.com"
        });
        let session: Session = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(session.token(), Some("tok123"));
        assert_eq!(session.user_id(), Some(7));
        assert_eq!(session.email(), Some("alice@example.com"));
        assert_eq!(session.profile().get("refresh"), Some(&json!("ref456")));

        let back = serde_json::to_value(&session).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_from_payload_fills_missing_username() {
        let session =
            Session::from_payload(json!({"access": "abc", "role": "recruiter"}), "carol").unwrap();
        assert_eq!(session.username, "carol");
        assert!(session.is_recruiter());
        assert!(session.is_well_formed());
    }

    #[test]
    fn test_from_payload_rejects_non_object() {
        assert!(Session::from_payload(json!(["not", "a", "session"]), "carol").is_err());
    }

    #[test]
    fn test_empty_token_counts_as_absent() {
        let session = Session::new("dave", Role::Candidate, Some(String::new()));
        assert!(!session.has_token());
    }

    #[test]
    fn test_reserved_keys_stay_out_of_profile() {
        let mut session = Session::new("frank", Role::Candidate, Some("tok".into()));
        assert!(!session.set_profile_field("role", json!("recruiter")));
        assert!(!session.set_profile_field("username", json!("mallory")));
        assert!(!session.set_profile_field("access", json!("other")));
        assert!(session.profile().is_empty());
        assert!(session.is_candidate());

        let raw = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_display_name_prefers_profile_name() {
        let mut session = Session::new("erin", Role::Candidate, None);
        assert_eq!(session.display_name(), "erin");
        assert!(session.set_profile_field("name", json!("Erin Example")));
        assert_eq!(session.display_name(), "Erin Example");
    }
}
