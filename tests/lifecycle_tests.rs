//! Authenticator lifecycle tests: login, add-user vetting, and profile load/unload
//! through the hub-facing hooks, against the in-memory OS backend.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use winauthenticator::config::AuthenticatorConfig;
use winauthenticator::error::{AuthError, AuthResult};
use winauthenticator::identity::{
    LoginRequest, ProfileOutcome, ProfileState, User, UserRegistry, WinAuthenticator,
};
use winauthenticator::platform::{LogonType, MemoryPlatform, OsCall};

#[derive(Default)]
struct RecordingRegistry {
    added: Mutex<Vec<String>>,
}

impl UserRegistry for RecordingRegistry {
    fn add_user(&self, name: &str) -> AuthResult<()> {
        self.added.lock().push(name.to_string());
        Ok(())
    }
    fn delete_user(&self, _name: &str) -> AuthResult<()> { Ok(()) }
    fn is_restricted(&self) -> bool { false }
    fn is_allowed(&self, _name: &str) -> bool { false }
}

fn hub_host() -> MemoryPlatform {
    MemoryPlatform::new()
        .with_local_user("alice", "pw")
        .with_local_user("carol", "pw")
        .with_domain_user("dave", "CORP", "pw")
        .with_group("admins", &["alice"])
}

#[tokio::test]
async fn login_load_unload_round_trip() -> Result<()> {
    let os = hub_host();
    let auth = WinAuthenticator::new(AuthenticatorConfig::default(), os.clone())?;

    let ok = auth.authenticate(LoginRequest::new("alice", "pw")).await?;
    assert_eq!(ok.name, "alice");
    assert_eq!(ok.domain, ".");
    let user = ok.into_user();
    let token = user.auth_token().expect("token stored").as_raw();

    let ProfileOutcome::Loaded(hive) = auth.pre_spawn_start(&user).await? else {
        panic!("profile should load");
    };
    assert_eq!(auth.profile_state("alice"), ProfileState::ProfileLoaded);
    assert!(auth.open_sessions());

    assert_eq!(auth.post_spawn_stop(&user).await?, ProfileOutcome::Unloaded);
    assert!(os.calls().contains(&OsCall::Unload { token, profile: hive.as_raw() }));
    assert_eq!(auth.profile_state("alice"), ProfileState::Idle);
    assert!(auth.open_sessions());

    // token handed to the hub is still the one and only open handle
    assert_eq!(os.open_tokens(), 1);
    assert_eq!(os.double_closes(), 0);
    Ok(())
}

#[tokio::test]
async fn logon_is_network_type_with_split_domain() -> Result<()> {
    let os = hub_host();
    let auth = WinAuthenticator::new(AuthenticatorConfig::default(), os.clone())?;
    auth.authenticate(LoginRequest::new("dave@CORP", "pw")).await?;
    assert_eq!(
        os.calls(),
        vec![OsCall::Logon { user: "dave".into(), domain: "CORP".into(), logon: LogonType::Network }]
    );
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_denied() -> Result<()> {
    let os = hub_host();
    let auth = WinAuthenticator::new(AuthenticatorConfig::default(), os.clone())?;
    let err = auth.authenticate(LoginRequest::new("alice", "nope")).await.unwrap_err();
    assert!(err.is_denied());
    assert_eq!(err.http_status(), 403);
    assert_eq!(os.open_tokens(), 0);
    Ok(())
}

#[tokio::test]
async fn closed_sessions_never_call_profile_loader() -> Result<()> {
    let os = hub_host();
    let cfg = AuthenticatorConfig { open_sessions: false, ..Default::default() };
    let auth = WinAuthenticator::new(cfg, os.clone())?;
    let user = auth.authenticate(LoginRequest::new("alice", "pw")).await?.into_user();
    assert_eq!(auth.pre_spawn_start(&user).await?, ProfileOutcome::Skipped);
    assert_eq!(auth.post_spawn_stop(&user).await?, ProfileOutcome::Skipped);
    assert_eq!(os.load_calls(), 0);
    assert_eq!(os.unload_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn one_load_failure_disables_profiles_for_everyone() -> Result<()> {
    let os = hub_host();
    let auth = WinAuthenticator::new(AuthenticatorConfig::default(), os.clone())?;
    let alice = auth.authenticate(LoginRequest::new("alice", "pw")).await?.into_user();
    let carol = auth.authenticate(LoginRequest::new("carol", "pw")).await?.into_user();

    os.set_fail_loads(true);
    // absorbed: the hook still returns Ok
    assert_eq!(auth.pre_spawn_start(&alice).await?, ProfileOutcome::Failed);
    assert!(!auth.open_sessions());

    os.set_fail_loads(false);
    assert_eq!(auth.pre_spawn_start(&carol).await?, ProfileOutcome::Skipped);
    assert_eq!(auth.post_spawn_stop(&alice).await?, ProfileOutcome::Skipped);
    assert_eq!(auth.post_spawn_stop(&carol).await?, ProfileOutcome::Skipped);
    assert_eq!(os.load_calls(), 1);
    assert_eq!(os.unload_calls(), 0);
    assert_eq!(auth.profile_state("carol"), ProfileState::Disabled);
    Ok(())
}

#[tokio::test]
async fn add_user_rejects_unknown_local_account() -> Result<()> {
    let os = hub_host();
    let registry = Arc::new(RecordingRegistry::default());
    let auth = WinAuthenticator::with_registry(AuthenticatorConfig::default(), os.clone(), registry.clone())?;

    let err = auth.add_user(&User::new("ghost")).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound { .. }));
    assert_eq!(err.message(), "User ghost does not exist.");
    assert!(registry.added.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn add_user_trusts_domain_names_and_delegates_local_ones() -> Result<()> {
    let os = hub_host();
    let registry = Arc::new(RecordingRegistry::default());
    let auth = WinAuthenticator::with_registry(AuthenticatorConfig::default(), os.clone(), registry.clone())?;

    auth.add_user(&User::new("nobody@ELSEWHERE")).await?;
    assert!(!os.calls().contains(&OsCall::ListUsers));

    auth.add_user(&User::new("alice")).await?;
    assert!(os.calls().contains(&OsCall::ListUsers));
    assert_eq!(*registry.added.lock(), vec!["nobody@ELSEWHERE".to_string(), "alice".to_string()]);
    Ok(())
}

#[tokio::test]
async fn group_whitelist_survives_a_broken_group() -> Result<()> {
    let os = hub_host();
    let cfg = AuthenticatorConfig { group_whitelist: vec!["ghosts".into(), "admins".into()], ..Default::default() };
    let auth = WinAuthenticator::new(cfg, os.clone())?;

    assert!(auth.authenticate(LoginRequest::new("alice", "pw")).await.is_ok());
    let err = auth.authenticate(LoginRequest::new("carol", "pw")).await.unwrap_err();
    assert_eq!(err.code_str(), "not_allowed");
    // carol's rejected token was released, alice's is held by the hub
    assert_eq!(os.open_tokens(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_hooks_are_serialized() -> Result<()> {
    let os = hub_host();
    let auth = WinAuthenticator::new(AuthenticatorConfig::default(), os.clone())?;
    let alice = auth.authenticate(LoginRequest::new("alice", "pw")).await?.into_user();
    let carol = auth.authenticate(LoginRequest::new("carol", "pw")).await?.into_user();

    let (a, c) = tokio::join!(auth.pre_spawn_start(&alice), auth.pre_spawn_start(&carol));
    assert!(matches!(a?, ProfileOutcome::Loaded(_)));
    assert!(matches!(c?, ProfileOutcome::Loaded(_)));
    assert_eq!(os.loaded_profiles().len(), 2);

    let (a, c) = tokio::join!(auth.post_spawn_stop(&alice), auth.post_spawn_stop(&carol));
    assert_eq!(a?, ProfileOutcome::Unloaded);
    assert_eq!(c?, ProfileOutcome::Unloaded);
    assert!(os.loaded_profiles().is_empty());
    assert!(auth.open_sessions());
    Ok(())
}
