//! OS collaborators: identity store, account/group directory, profile loader.
//! All calls are blocking and are only ever made from the authenticator's lane.

pub mod memory;
#[cfg(windows)]
pub mod win32;

use crate::error::OsError;
use crate::identity::{LiveToken, RawCredential};

pub use memory::{MemoryPlatform, OsCall};
#[cfg(windows)]
pub use win32::Win32Platform;

#[cfg(windows)]
pub type DefaultPlatform = Win32Platform;
#[cfg(not(windows))]
pub type DefaultPlatform = MemoryPlatform;

/// Logon kind passed to the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogonType {
    /// Verifies the password without creating an interactive profile.
    Network,
    Interactive,
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogonProvider {
    Default,
}

/// Handle returned by a profile load (the user's registry hive).
/// Never dereferenced here; it must be handed back unchanged to unload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileHandle(isize);

impl ProfileHandle {
    pub const fn from_raw(v: isize) -> Self { Self(v) }
    pub const fn as_raw(self) -> isize { self.0 }
}

pub trait IdentityStore: Send + Sync + 'static {
    /// Returns a token the caller owns and must eventually pass to `close_handle`.
    fn logon_user(
        &self,
        user: &str,
        domain: &str,
        password: &str,
        logon: LogonType,
        provider: LogonProvider,
    ) -> Result<RawCredential, OsError>;

    fn close_handle(&self, token: RawCredential);
}

pub trait AccountDirectory: Send + Sync + 'static {
    fn local_users(&self) -> Result<Vec<String>, OsError>;
    fn local_group_members(&self, group: &str) -> Result<Vec<String>, OsError>;
    /// Roaming profile path configured on the account, if any.
    fn profile_path(&self, user: &str) -> Result<Option<String>, OsError>;
}

pub trait ProfileLoader: Send + Sync + 'static {
    fn load_user_profile(
        &self,
        token: LiveToken<'_>,
        user: &str,
        profile_path: Option<&str>,
    ) -> Result<ProfileHandle, OsError>;

    fn unload_user_profile(&self, token: LiveToken<'_>, profile: ProfileHandle) -> Result<(), OsError>;
}

/// Everything the authenticator needs from the OS.
pub trait Platform: IdentityStore + AccountDirectory + ProfileLoader {}

impl<T: IdentityStore + AccountDirectory + ProfileLoader> Platform for T {}
