//! Per-user OS profile handling around workload start/stop.
//! A failed load or unload switches profile handling off for the whole process
//! until restart; the workload itself is never blocked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::credential::CredentialLease;
use super::user::User;
use crate::error::{AuthError, AuthResult};
use crate::platform::{Platform, ProfileHandle};

/// Process-wide `open_sessions` switch. Only ever goes from on to off at runtime.
#[derive(Debug)]
pub struct SessionPolicy {
    open: AtomicBool,
    disable_after_load_failure: bool,
}

impl SessionPolicy {
    pub fn new(open_sessions: bool, disable_after_load_failure: bool) -> Self {
        Self { open: AtomicBool::new(open_sessions), disable_after_load_failure }
    }

    pub fn is_open(&self) -> bool { self.open.load(Ordering::SeqCst) }

    fn disable(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            warn!(target: "winauth", "Disabling user profile from now on.");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    Idle,
    ProfileLoaded,
    /// Profile handling is off, by configuration or after a failure.
    Disabled,
}

/// What a pre-start or post-stop call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOutcome {
    /// `open_sessions` is off; the OS was not touched.
    Skipped,
    Loaded(ProfileHandle),
    Unloaded,
    /// Post-stop for a user whose profile was never loaded.
    NothingToUnload,
    /// Logged and absorbed; see `open_sessions()` for the resulting policy.
    Failed,
}

/// Session resource manager. Keeps one profile handle per user between load and unload.
#[derive(Debug)]
pub struct ProfileSessions {
    policy: SessionPolicy,
    loaded: Mutex<HashMap<String, ProfileHandle>>,
}

impl ProfileSessions {
    pub fn new(policy: SessionPolicy) -> Self {
        Self { policy, loaded: Mutex::new(HashMap::new()) }
    }

    pub fn open_sessions(&self) -> bool { self.policy.is_open() }

    pub fn state_for(&self, username: &str) -> ProfileState {
        if !self.policy.is_open() {
            ProfileState::Disabled
        } else if self.loaded.lock().contains_key(username) {
            ProfileState::ProfileLoaded
        } else {
            ProfileState::Idle
        }
    }

    pub fn loaded_handle(&self, username: &str) -> Option<ProfileHandle> {
        self.loaded.lock().get(username).copied()
    }

    /// Load the user's profile before the workload starts.
    pub fn pre_start<P: Platform + ?Sized>(&self, platform: &P, user: &User) -> ProfileOutcome {
        if !self.policy.is_open() {
            debug!(target: "winauth", "open_sessions off, not loading profile for {}", user.name);
            return ProfileOutcome::Skipped;
        }
        match self.load(platform, user) {
            Ok(handle) => {
                if let Some(prev) = self.loaded.lock().insert(user.name.clone(), handle) {
                    warn!(target: "winauth", "profile handle {:#x} for {} replaced before unload", prev.as_raw(), user.name);
                }
                info!(target: "winauth", "Loaded user profile for {}", user.name);
                ProfileOutcome::Loaded(handle)
            }
            Err(e) => {
                warn!(target: "winauth", "Failed to load user profile for {}: {}", user.name, e);
                if self.policy.disable_after_load_failure {
                    self.policy.disable();
                }
                ProfileOutcome::Failed
            }
        }
    }

    fn load<P: Platform + ?Sized>(&self, platform: &P, user: &User) -> AuthResult<ProfileHandle> {
        let raw = stored_token(user)?;
        let lease = CredentialLease::reattach(raw, platform);
        // Roaming profile paths only exist for local accounts.
        let profile_path = if user.is_local() { platform.profile_path(&user.name)? } else { None };
        let handle = platform.load_user_profile(lease.live(), &user.name, profile_path.as_deref())?;
        Ok(handle)
    }

    /// Unload the profile loaded by `pre_start` once the workload has stopped.
    pub fn post_stop<P: Platform + ?Sized>(&self, platform: &P, user: &User) -> ProfileOutcome {
        if !self.policy.is_open() {
            debug!(target: "winauth", "open_sessions off, not unloading profile for {}", user.name);
            return ProfileOutcome::Skipped;
        }
        let raw = match stored_token(user) {
            Ok(raw) => raw,
            Err(e) => return self.unload_failed(user, e),
        };
        let lease = CredentialLease::reattach(raw, platform);
        // Taken out of the map even if unload fails; the handle is stale either way.
        let slot = self.loaded.lock().remove(&user.name);
        let Some(handle) = slot else {
            debug!(target: "winauth", "no loaded profile for {}", user.name);
            return ProfileOutcome::NothingToUnload;
        };
        match platform.unload_user_profile(lease.live(), handle) {
            Ok(()) => {
                info!(target: "winauth", "Unloaded user profile for {}", user.name);
                ProfileOutcome::Unloaded
            }
            Err(e) => self.unload_failed(user, e.into()),
        }
    }

    fn unload_failed(&self, user: &User, e: AuthError) -> ProfileOutcome {
        warn!(target: "winauth", "Failed to unload user profile for {}: {}", user.name, e);
        self.policy.disable();
        ProfileOutcome::Failed
    }
}

fn stored_token(user: &User) -> AuthResult<super::credential::RawCredential> {
    user.auth_token().ok_or_else(|| {
        AuthError::resource("missing_auth_state".to_string(), format!("no auth token stored for {}", user.name))
    })
}
