use tracing::{debug, warn};

use super::credential::{OwnedCredential, RawCredential};
use super::username::split_username;
use crate::error::{AuthError, AuthResult, OsError};
use crate::platform::{IdentityStore, LogonProvider, LogonType};

/// A verified login. The credential is still attached; whoever keeps it must
/// `detach` before it crosses an await or lands in auth state.
#[derive(Debug)]
pub struct Verified<'s, S: IdentityStore + ?Sized> {
    /// Name as typed, possibly `user@domain`.
    pub name: String,
    pub domain: String,
    pub credential: OwnedCredential<'s, S>,
}

/// Login check against the OS identity store.
pub struct IdentityVerifier<'s, S: IdentityStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: IdentityStore + ?Sized> IdentityVerifier<'s, S> {
    pub fn new(store: &'s S) -> Self { Self { store } }

    /// Network logon with the default provider, so nothing is created on disk yet.
    /// Any rejection is `Denied`; there is no retry.
    pub fn authenticate(&self, username: &str, password: &str) -> AuthResult<Verified<'s, S>> {
        let (local, domain) = split_username(username);
        if local.is_empty() {
            return Err(AuthError::denied("invalid_username".to_string(), format!("'{}' has no account name", username)));
        }
        let raw = match self.store.logon_user(local, domain, password, LogonType::Network, LogonProvider::Default) {
            Ok(raw) => raw,
            Err(OsError::InvalidCredentials { code, .. }) => {
                debug!(target: "winauth", "logon rejected for {} (os error {})", username, code);
                return Err(AuthError::denied("invalid_credentials", "invalid username or password"));
            }
            Err(e) => {
                warn!(target: "winauth", "logon failed for {}: {}", username, e);
                return Err(AuthError::denied("logon_failed", "invalid username or password"));
            }
        };
        if raw.is_null() {
            return Err(AuthError::denied("invalid_credentials", "invalid username or password"));
        }
        Ok(Verified {
            name: username.to_string(),
            domain: domain.to_string(),
            credential: OwnedCredential::new(raw, self.store),
        })
    }
}

impl<S: IdentityStore + ?Sized> Verified<'_, S> {
    /// Release the token for hand-off, keeping the names.
    pub fn detach(self) -> (String, String, RawCredential) {
        (self.name, self.domain, self.credential.detach())
    }
}
