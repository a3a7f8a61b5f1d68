use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use super::accounts::ExistenceChecker;
use super::membership::MembershipChecker;
use super::profile::{ProfileOutcome, ProfileSessions, ProfileState, SessionPolicy};
use super::registry::{AllowedUsers, UserRegistry};
use super::user::{AuthState, Authenticated, LoginRequest, User};
use super::username::{is_domain_qualified, qualify};
use super::verifier::IdentityVerifier;
use crate::config::AuthenticatorConfig;
use crate::error::{AuthError, AuthResult};
use crate::lane::BlockingLane;
use crate::platform::Platform;
use crate::tprintln;

struct Shared<P: Platform> {
    platform: P,
    config: AuthenticatorConfig,
    sessions: ProfileSessions,
    registry: Arc<dyn UserRegistry>,
}

/// Hub-facing authenticator for local Windows accounts.
///
/// Every hook that touches the OS runs on one background worker, so calls from
/// the hub's event loop never block it and never overlap each other.
pub struct WinAuthenticator<P: Platform> {
    shared: Arc<Shared<P>>,
    lane: BlockingLane,
}

impl<P: Platform> WinAuthenticator<P> {
    pub fn new(config: AuthenticatorConfig, platform: P) -> anyhow::Result<Self> {
        let registry = Arc::new(AllowedUsers::new(config.allowed_users.iter().cloned()));
        Self::with_registry(config, platform, registry)
    }

    pub fn with_registry(
        mut config: AuthenticatorConfig,
        platform: P,
        registry: Arc<dyn UserRegistry>,
    ) -> anyhow::Result<Self> {
        config.normalize();
        let lane = BlockingLane::new("winauth-lane").context("starting authenticator worker thread")?;
        let sessions = ProfileSessions::new(SessionPolicy::new(
            config.open_sessions,
            config.disable_open_sessions_after_failure,
        ));
        info!(
            target: "winauth",
            "authenticator ready: open_sessions={}, group_whitelist={:?}, domain='{}'",
            config.open_sessions, config.group_whitelist, config.domain_to_add_to_username
        );
        Ok(Self { shared: Arc::new(Shared { platform, config, sessions, registry }), lane })
    }

    pub fn config(&self) -> &AuthenticatorConfig { &self.shared.config }
    pub fn platform(&self) -> &P { &self.shared.platform }

    /// Current value of the process-wide profile switch.
    pub fn open_sessions(&self) -> bool { self.shared.sessions.open_sessions() }

    pub fn profile_state(&self, username: &str) -> ProfileState { self.shared.sessions.state_for(username) }

    pub fn normalize_username(&self, username: &str) -> String { self.shared.normalize_username(username) }

    /// Verify a login. On success the detached token is in `auth_state`; the hub
    /// must keep it until post-stop.
    pub async fn authenticate(&self, req: LoginRequest) -> AuthResult<Authenticated> {
        let shared = self.shared.clone();
        self.lane.run(move || shared.authenticate(&req)).await?
    }

    /// Vet a new hub user. Local names must already exist; domain names are trusted.
    pub async fn add_user(&self, user: &User) -> AuthResult<()> {
        let shared = self.shared.clone();
        let name = user.name.clone();
        self.lane.run(move || shared.add_user(&name)).await?
    }

    pub async fn delete_user(&self, user: &User) -> AuthResult<()> {
        self.shared.registry.delete_user(&user.name)
    }

    /// Load the user's profile before their workload starts. Profile failures are
    /// absorbed; `Err` only means the worker itself is gone.
    pub async fn pre_spawn_start(&self, user: &User) -> AuthResult<ProfileOutcome> {
        let shared = self.shared.clone();
        let user = user.clone();
        self.lane.run(move || shared.sessions.pre_start(&shared.platform, &user)).await
    }

    /// Unload the profile after the workload stopped.
    pub async fn post_spawn_stop(&self, user: &User) -> AuthResult<ProfileOutcome> {
        let shared = self.shared.clone();
        let user = user.clone();
        self.lane.run(move || shared.sessions.post_stop(&shared.platform, &user)).await
    }
}

impl<P: Platform> Shared<P> {
    fn normalize_username(&self, username: &str) -> String {
        self.config.username_map.get(username).cloned().unwrap_or_else(|| username.to_string())
    }

    fn authenticate(&self, req: &LoginRequest) -> AuthResult<Authenticated> {
        let typed = qualify(&req.username, &self.config.domain_to_add_to_username);
        let verified = IdentityVerifier::new(&self.platform).authenticate(&typed, &req.password)?;
        let name = self.normalize_username(&verified.name);
        if !self.is_allowed(&name) {
            // `verified` drops here and closes the fresh token.
            info!(target: "winauth", "login for {} rejected: not in allowed users or groups", name);
            return Err(AuthError::denied("not_allowed".to_string(), format!("{} is not allowed to log in", name)));
        }
        let (_, domain, raw) = verified.detach();
        info!(target: "winauth", "login ok for {} (domain {})", name, domain);
        tprintln!("auth.login user={} domain={}", name, domain);
        Ok(Authenticated { name, domain, auth_state: AuthState { auth_token: raw } })
    }

    fn is_allowed(&self, name: &str) -> bool {
        let groups = &self.config.group_whitelist;
        if groups.is_empty() && !self.registry.is_restricted() {
            return true;
        }
        self.registry.is_allowed(name) || MembershipChecker::new(&self.platform, groups).is_member(name)
    }

    fn add_user(&self, name: &str) -> AuthResult<()> {
        if !is_domain_qualified(name) {
            let exists = ExistenceChecker::new(&self.platform).user_exists(name).map_err(|e| {
                warn!(target: "winauth", "could not enumerate local accounts: {}", e);
                AuthError::internal("account_lookup_failed".to_string(), e.to_string())
            })?;
            if !exists {
                if self.config.create_system_users {
                    return Err(AuthError::unsupported(
                        "create_system_users",
                        "There is no support for create_system_users on Windows",
                    ));
                }
                return Err(AuthError::not_found("user_not_found".to_string(), format!("User {} does not exist.", name)));
            }
        }
        self.registry.add_user(name)
    }
}
