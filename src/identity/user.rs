use std::fmt;

use serde::{Deserialize, Serialize};

use super::credential::RawCredential;
use super::username::is_domain_qualified;

/// Per-user state the hub keeps between login and spawner start/stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    /// Detached logon token.
    pub auth_token: RawCredential,
}

/// User record owned by the orchestration platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub auth_state: Option<AuthState>,
}

impl User {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), auth_state: None }
    }

    pub fn with_auth_state(mut self, state: AuthState) -> Self {
        self.auth_state = Some(state);
        self
    }

    pub fn is_local(&self) -> bool { !is_domain_qualified(&self.name) }

    pub fn auth_token(&self) -> Option<RawCredential> {
        self.auth_state.map(|s| s.auth_token)
    }
}

#[derive(Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new<S: Into<String>>(username: S, password: S) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest").field("username", &self.username).field("password", &"<redacted>").finish()
    }
}

/// Successful login as handed back to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticated {
    pub name: String,
    pub domain: String,
    pub auth_state: AuthState,
}

impl Authenticated {
    pub fn into_user(self) -> User {
        User { name: self.name, auth_state: Some(self.auth_state) }
    }
}
