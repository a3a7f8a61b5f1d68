use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::platform::IdentityStore;

/// Plain token value with no destructor. This is the only form that may be
/// stored in auth state or moved across an await.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCredential(isize);

impl RawCredential {
    pub const fn from_raw(v: isize) -> Self { Self(v) }
    pub const fn as_raw(self) -> isize { self.0 }
    pub const fn is_null(self) -> bool { self.0 == 0 }
}

/// Attached token: closes the OS handle on drop unless detached first.
pub struct OwnedCredential<'s, S: IdentityStore + ?Sized> {
    raw: RawCredential,
    store: &'s S,
    attached: bool,
}

impl<'s, S: IdentityStore + ?Sized> OwnedCredential<'s, S> {
    /// Take ownership of a token just issued by `store`.
    pub fn new(raw: RawCredential, store: &'s S) -> Self {
        Self { raw, store, attached: true }
    }

    /// Take ownership back of a value previously released with `detach`.
    /// The caller asserts nobody else holds it attached.
    pub fn reattach(raw: RawCredential, store: &'s S) -> Self {
        Self::new(raw, store)
    }

    pub fn live(&self) -> LiveToken<'_> {
        LiveToken { raw: self.raw, _owner: PhantomData }
    }

    /// Give up ownership; the OS handle stays open.
    pub fn detach(mut self) -> RawCredential {
        self.attached = false;
        self.raw
    }
}

impl<S: IdentityStore + ?Sized> Drop for OwnedCredential<'_, S> {
    fn drop(&mut self) {
        if self.attached {
            self.store.close_handle(self.raw);
        }
    }
}

impl<'s, S: IdentityStore + ?Sized> From<OwnedCredential<'s, S>> for RawCredential {
    fn from(owned: OwnedCredential<'s, S>) -> Self { owned.detach() }
}

impl<S: IdentityStore + ?Sized> fmt::Debug for OwnedCredential<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedCredential").field("raw", &self.raw).field("attached", &self.attached).finish()
    }
}

/// Borrowed view of an attached token. Only obtainable while an owner is alive,
/// so OS calls taking it cannot see a released handle.
#[derive(Debug, Clone, Copy)]
pub struct LiveToken<'a> {
    raw: RawCredential,
    _owner: PhantomData<&'a ()>,
}

impl LiveToken<'_> {
    pub fn raw(&self) -> RawCredential { self.raw }
}

/// Reattached token for the span of one operation. Detaches again when it goes
/// out of scope on every path, including early returns and unwinding, so the
/// stored value stays valid for the next hand-off.
pub struct CredentialLease<'s, S: IdentityStore + ?Sized> {
    inner: OwnedCredential<'s, S>,
}

impl<'s, S: IdentityStore + ?Sized> CredentialLease<'s, S> {
    pub fn reattach(raw: RawCredential, store: &'s S) -> Self {
        Self { inner: OwnedCredential::reattach(raw, store) }
    }

    pub fn live(&self) -> LiveToken<'_> { self.inner.live() }
}

impl<S: IdentityStore + ?Sized> Drop for CredentialLease<'_, S> {
    fn drop(&mut self) {
        // Runs before the field drop, so the handle is not closed.
        self.inner.attached = false;
    }
}
