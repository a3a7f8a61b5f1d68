//! Win32 backend: LogonUserW, NetUserEnum/NetLocalGroupGetMembers/NetUserGetInfo,
//! LoadUserProfileW/UnloadUserProfile. Loading profiles needs SE_RESTORE_NAME and
//! SE_BACKUP_NAME on the hub process.

use std::ptr;

use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};
use windows_sys::Win32::NetworkManagement::NetManagement::{
    NetApiBufferFree, NetLocalGroupGetMembers, NetUserEnum, NetUserGetInfo, FILTER_NORMAL_ACCOUNT,
    LOCALGROUP_MEMBERS_INFO_1, MAX_PREFERRED_LENGTH, USER_INFO_0, USER_INFO_4,
};
use windows_sys::Win32::Security::{
    LogonUserW, LOGON32_LOGON_BATCH, LOGON32_LOGON_INTERACTIVE, LOGON32_LOGON_NETWORK, LOGON32_PROVIDER_DEFAULT,
};
use windows_sys::Win32::UI::Shell::{LoadUserProfileW, UnloadUserProfile, PROFILEINFOW};

use super::{AccountDirectory, IdentityStore, LogonProvider, LogonType, ProfileHandle, ProfileLoader};
use crate::error::OsError;
use crate::identity::{LiveToken, RawCredential};

const NERR_SUCCESS: u32 = 0;
const ERROR_MORE_DATA: u32 = 234;
const NERR_USER_NOT_FOUND: u32 = 2221;
const PI_NOUI: u32 = 1;

// LogonUserW codes that mean "wrong name or password" rather than a broken call.
const CREDENTIAL_ERRORS: &[u32] = &[
    1317, // ERROR_NO_SUCH_USER
    1326, // ERROR_LOGON_FAILURE
    1327, // ERROR_ACCOUNT_RESTRICTION
    1330, // ERROR_PASSWORD_EXPIRED
    1331, // ERROR_ACCOUNT_DISABLED
    1909, // ERROR_ACCOUNT_LOCKED_OUT
];

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// # Safety
/// `p` must be null or point at a nul-terminated UTF-16 string.
unsafe fn from_wide(p: *const u16) -> String {
    if p.is_null() {
        return String::new();
    }
    let mut len = 0usize;
    while *p.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(p, len))
}

fn last_error() -> u32 {
    unsafe { GetLastError() }
}

/// Buffer allocated by a NetApi call, freed on drop.
struct NetBuffer(*mut u8);

impl Drop for NetBuffer {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { NetApiBufferFree(self.0 as _) };
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Platform;

impl Win32Platform {
    pub fn new() -> Self { Self }
}

impl IdentityStore for Win32Platform {
    fn logon_user(
        &self,
        user: &str,
        domain: &str,
        password: &str,
        logon: LogonType,
        provider: LogonProvider,
    ) -> Result<RawCredential, OsError> {
        let logon_type = match logon {
            LogonType::Network => LOGON32_LOGON_NETWORK,
            LogonType::Interactive => LOGON32_LOGON_INTERACTIVE,
            LogonType::Batch => LOGON32_LOGON_BATCH,
        };
        let provider = match provider {
            LogonProvider::Default => LOGON32_PROVIDER_DEFAULT,
        };
        let (u, d) = (wide(user), wide(domain));
        let mut pw = wide(password);
        let mut token: HANDLE = 0 as _;
        let ok = unsafe { LogonUserW(u.as_ptr(), d.as_ptr(), pw.as_ptr(), logon_type, provider, &mut token) };
        let code = if ok == 0 { last_error() } else { NERR_SUCCESS };
        pw.iter_mut().for_each(|c| *c = 0);
        if ok == 0 {
            if CREDENTIAL_ERRORS.contains(&code) {
                return Err(OsError::InvalidCredentials { op: "LogonUserW", code });
            }
            return Err(OsError::call("LogonUserW", code, format!("logon for {}\\{} failed", domain, user)));
        }
        Ok(RawCredential::from_raw(token as isize))
    }

    fn close_handle(&self, token: RawCredential) {
        if !token.is_null() {
            unsafe { CloseHandle(token.as_raw() as _) };
        }
    }
}

impl AccountDirectory for Win32Platform {
    fn local_users(&self) -> Result<Vec<String>, OsError> {
        let mut names = Vec::new();
        let mut resume: u32 = 0;
        loop {
            let mut buf: *mut u8 = ptr::null_mut();
            let (mut read, mut total) = (0u32, 0u32);
            let status = unsafe {
                NetUserEnum(
                    ptr::null(),
                    0,
                    FILTER_NORMAL_ACCOUNT,
                    &mut buf,
                    MAX_PREFERRED_LENGTH,
                    &mut read,
                    &mut total,
                    &mut resume,
                )
            };
            let guard = NetBuffer(buf);
            if status != NERR_SUCCESS && status != ERROR_MORE_DATA {
                return Err(OsError::call("NetUserEnum", status, "enumerating local accounts"));
            }
            let entries = guard.0 as *const USER_INFO_0;
            for i in 0..read as usize {
                names.push(unsafe { from_wide((*entries.add(i)).usri0_name) });
            }
            if status != ERROR_MORE_DATA {
                break;
            }
        }
        Ok(names)
    }

    fn local_group_members(&self, group: &str) -> Result<Vec<String>, OsError> {
        let g = wide(group);
        let mut names = Vec::new();
        let mut resume: usize = 0;
        loop {
            let mut buf: *mut u8 = ptr::null_mut();
            let (mut read, mut total) = (0u32, 0u32);
            let status = unsafe {
                NetLocalGroupGetMembers(ptr::null(), g.as_ptr(), 1, &mut buf, MAX_PREFERRED_LENGTH, &mut read, &mut total, &mut resume)
            };
            let guard = NetBuffer(buf);
            if status != NERR_SUCCESS && status != ERROR_MORE_DATA {
                return Err(OsError::call("NetLocalGroupGetMembers", status, format!("reading members of {}", group)));
            }
            let entries = guard.0 as *const LOCALGROUP_MEMBERS_INFO_1;
            for i in 0..read as usize {
                names.push(unsafe { from_wide((*entries.add(i)).lgrmi1_name) });
            }
            if status != ERROR_MORE_DATA {
                break;
            }
        }
        Ok(names)
    }

    fn profile_path(&self, user: &str) -> Result<Option<String>, OsError> {
        let u = wide(user);
        let mut buf: *mut u8 = ptr::null_mut();
        let status = unsafe { NetUserGetInfo(ptr::null(), u.as_ptr(), 4, &mut buf) };
        let guard = NetBuffer(buf);
        if status == NERR_USER_NOT_FOUND {
            return Err(OsError::NotFound { op: "NetUserGetInfo", name: user.to_string() });
        }
        if status != NERR_SUCCESS || guard.0.is_null() {
            return Err(OsError::call("NetUserGetInfo", status, format!("reading account info for {}", user)));
        }
        let info = guard.0 as *const USER_INFO_4;
        let path = unsafe { from_wide((*info).usri4_profile) };
        Ok(if path.is_empty() { None } else { Some(path) })
    }
}

impl ProfileLoader for Win32Platform {
    fn load_user_profile(
        &self,
        token: LiveToken<'_>,
        user: &str,
        profile_path: Option<&str>,
    ) -> Result<ProfileHandle, OsError> {
        let mut name = wide(user);
        let mut path = profile_path.filter(|p| !p.is_empty()).map(wide);
        let mut info: PROFILEINFOW = unsafe { std::mem::zeroed() };
        info.dwSize = std::mem::size_of::<PROFILEINFOW>() as u32;
        info.dwFlags = PI_NOUI;
        info.lpUserName = name.as_mut_ptr();
        info.lpProfilePath = path.as_mut().map(|p| p.as_mut_ptr()).unwrap_or(ptr::null_mut());
        let ok = unsafe { LoadUserProfileW(token.raw().as_raw() as _, &mut info) };
        if ok == 0 {
            return Err(OsError::call("LoadUserProfileW", last_error(), format!("loading profile for {}", user)));
        }
        Ok(ProfileHandle::from_raw(info.hProfile as isize))
    }

    fn unload_user_profile(&self, token: LiveToken<'_>, profile: ProfileHandle) -> Result<(), OsError> {
        let ok = unsafe { UnloadUserProfile(token.raw().as_raw() as _, profile.as_raw() as _) };
        if ok == 0 {
            return Err(OsError::call("UnloadUserProfile", last_error(), "unloading profile"));
        }
        Ok(())
    }
}
