//! In-process OS stand-in. Used on non-Windows targets and by the test suites;
//! records every call and tracks token/profile lifetimes so misuse is visible.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AccountDirectory, IdentityStore, LogonProvider, LogonType, ProfileHandle, ProfileLoader};
use crate::error::OsError;
use crate::identity::{LiveToken, RawCredential, LOCAL_DOMAIN};

const ERROR_INVALID_HANDLE: u32 = 6;
const ERROR_PRIVILEGE_NOT_HELD: u32 = 1314;
const ERROR_LOGON_FAILURE: u32 = 1326;
const NERR_GROUP_NOT_FOUND: u32 = 2220;
const ERROR_ACCESS_DENIED: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsCall {
    Logon { user: String, domain: String, logon: LogonType },
    Close { token: isize },
    ListUsers,
    GroupMembers { group: String },
    ProfilePath { user: String },
    Load { user: String, token: isize, profile_path: Option<String> },
    Unload { token: isize, profile: isize },
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    profile_path: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    // keyed by (local name, domain); local accounts use LOCAL_DOMAIN
    accounts: BTreeMap<(String, String), Account>,
    groups: HashMap<String, Vec<String>>,
    fail_loads: bool,
    fail_unloads: bool,
    fail_user_listing: bool,
    next_handle: isize,
    open_tokens: HashMap<isize, String>,
    double_closes: usize,
    loaded: HashMap<isize, String>,
    calls: Vec<OsCall>,
}

impl State {
    fn issue_handle(&mut self) -> isize {
        self.next_handle += 4;
        0x100 + self.next_handle
    }

    fn check_token(&self, token: RawCredential, op: &'static str) -> Result<(), OsError> {
        if self.open_tokens.contains_key(&token.as_raw()) {
            Ok(())
        } else {
            Err(OsError::call(op, ERROR_INVALID_HANDLE, format!("token {:#x} is not open", token.as_raw())))
        }
    }
}

/// Cloning shares state, so a test can keep a handle after giving one to the authenticator.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlatform {
    state: Arc<Mutex<State>>,
}

impl MemoryPlatform {
    pub fn new() -> Self { Self::default() }

    pub fn with_local_user(self, name: &str, password: &str) -> Self {
        self.state.lock().accounts.insert(
            (name.to_string(), LOCAL_DOMAIN.to_string()),
            Account { password: password.to_string(), profile_path: None },
        );
        self
    }

    pub fn with_domain_user(self, name: &str, domain: &str, password: &str) -> Self {
        self.state.lock().accounts.insert(
            (name.to_string(), domain.to_string()),
            Account { password: password.to_string(), profile_path: None },
        );
        self
    }

    pub fn with_profile_path(self, name: &str, path: &str) -> Self {
        if let Some(acct) = self.state.lock().accounts.get_mut(&(name.to_string(), LOCAL_DOMAIN.to_string())) {
            acct.profile_path = Some(path.to_string());
        }
        self
    }

    pub fn with_group(self, group: &str, members: &[&str]) -> Self {
        self.state.lock().groups.insert(group.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn set_fail_loads(&self, fail: bool) { self.state.lock().fail_loads = fail; }
    pub fn set_fail_unloads(&self, fail: bool) { self.state.lock().fail_unloads = fail; }
    pub fn set_fail_user_listing(&self, fail: bool) { self.state.lock().fail_user_listing = fail; }

    pub fn calls(&self) -> Vec<OsCall> { self.state.lock().calls.clone() }

    pub fn load_calls(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| matches!(c, OsCall::Load { .. })).count()
    }

    pub fn unload_calls(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| matches!(c, OsCall::Unload { .. })).count()
    }

    pub fn open_tokens(&self) -> usize { self.state.lock().open_tokens.len() }
    pub fn double_closes(&self) -> usize { self.state.lock().double_closes }

    /// Currently loaded profiles as (handle, user), sorted by handle.
    pub fn loaded_profiles(&self) -> Vec<(ProfileHandle, String)> {
        let st = self.state.lock();
        let mut v: Vec<_> = st.loaded.iter().map(|(h, u)| (ProfileHandle::from_raw(*h), u.clone())).collect();
        v.sort_by_key(|(h, _)| h.as_raw());
        v
    }
}

impl IdentityStore for MemoryPlatform {
    fn logon_user(
        &self,
        user: &str,
        domain: &str,
        password: &str,
        logon: LogonType,
        _provider: LogonProvider,
    ) -> Result<RawCredential, OsError> {
        let mut st = self.state.lock();
        st.calls.push(OsCall::Logon { user: user.to_string(), domain: domain.to_string(), logon });
        let ok = st
            .accounts
            .get(&(user.to_string(), domain.to_string()))
            .map(|a| a.password == password)
            .unwrap_or(false);
        if !ok {
            return Err(OsError::InvalidCredentials { op: "LogonUserW", code: ERROR_LOGON_FAILURE });
        }
        let h = st.issue_handle();
        let owner = if domain == LOCAL_DOMAIN { user.to_string() } else { format!("{}@{}", user, domain) };
        st.open_tokens.insert(h, owner);
        Ok(RawCredential::from_raw(h))
    }

    fn close_handle(&self, token: RawCredential) {
        let mut st = self.state.lock();
        st.calls.push(OsCall::Close { token: token.as_raw() });
        if st.open_tokens.remove(&token.as_raw()).is_none() {
            st.double_closes += 1;
        }
    }
}

impl AccountDirectory for MemoryPlatform {
    fn local_users(&self) -> Result<Vec<String>, OsError> {
        let mut st = self.state.lock();
        st.calls.push(OsCall::ListUsers);
        if st.fail_user_listing {
            return Err(OsError::call("NetUserEnum", ERROR_ACCESS_DENIED, "access denied"));
        }
        Ok(st
            .accounts
            .keys()
            .filter(|(_, domain)| domain == LOCAL_DOMAIN)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn local_group_members(&self, group: &str) -> Result<Vec<String>, OsError> {
        let mut st = self.state.lock();
        st.calls.push(OsCall::GroupMembers { group: group.to_string() });
        st.groups
            .get(group)
            .cloned()
            .ok_or_else(|| OsError::call("NetLocalGroupGetMembers", NERR_GROUP_NOT_FOUND, format!("group {} not found", group)))
    }

    fn profile_path(&self, user: &str) -> Result<Option<String>, OsError> {
        let mut st = self.state.lock();
        st.calls.push(OsCall::ProfilePath { user: user.to_string() });
        st.accounts
            .get(&(user.to_string(), LOCAL_DOMAIN.to_string()))
            .map(|a| a.profile_path.clone())
            .ok_or_else(|| OsError::NotFound { op: "NetUserGetInfo", name: user.to_string() })
    }
}

impl ProfileLoader for MemoryPlatform {
    fn load_user_profile(
        &self,
        token: LiveToken<'_>,
        user: &str,
        profile_path: Option<&str>,
    ) -> Result<ProfileHandle, OsError> {
        let mut st = self.state.lock();
        st.calls.push(OsCall::Load {
            user: user.to_string(),
            token: token.raw().as_raw(),
            profile_path: profile_path.map(|p| p.to_string()),
        });
        st.check_token(token.raw(), "LoadUserProfileW")?;
        if st.fail_loads {
            return Err(OsError::call("LoadUserProfileW", ERROR_PRIVILEGE_NOT_HELD, "a required privilege is not held by the client"));
        }
        let h = st.issue_handle();
        st.loaded.insert(h, user.to_string());
        Ok(ProfileHandle::from_raw(h))
    }

    fn unload_user_profile(&self, token: LiveToken<'_>, profile: ProfileHandle) -> Result<(), OsError> {
        let mut st = self.state.lock();
        st.calls.push(OsCall::Unload { token: token.raw().as_raw(), profile: profile.as_raw() });
        st.check_token(token.raw(), "UnloadUserProfile")?;
        if st.fail_unloads {
            return Err(OsError::call("UnloadUserProfile", ERROR_PRIVILEGE_NOT_HELD, "a required privilege is not held by the client"));
        }
        if st.loaded.remove(&profile.as_raw()).is_none() {
            return Err(OsError::call("UnloadUserProfile", ERROR_INVALID_HANDLE, format!("profile {:#x} is not loaded", profile.as_raw())));
        }
        Ok(())
    }
}
