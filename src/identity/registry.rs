use std::collections::BTreeSet;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::AuthResult;

/// The hub's own user bookkeeping, called once an add/delete has been vetted.
pub trait UserRegistry: Send + Sync + 'static {
    fn add_user(&self, name: &str) -> AuthResult<()>;
    fn delete_user(&self, name: &str) -> AuthResult<()>;
    /// False when the registry keeps no user allow-list at all.
    fn is_restricted(&self) -> bool;
    fn is_allowed(&self, name: &str) -> bool;
}

/// Default registry: an explicit user allow-list. Adding a user extends the list
/// only when the list is in use; an empty list stays empty (no restriction).
#[derive(Debug, Default)]
pub struct AllowedUsers {
    names: RwLock<BTreeSet<String>>,
}

impl AllowedUsers {
    pub fn new<I: IntoIterator<Item = String>>(names: I) -> Self {
        Self { names: RwLock::new(names.into_iter().collect()) }
    }

    pub fn names(&self) -> Vec<String> { self.names.read().iter().cloned().collect() }
}

impl UserRegistry for AllowedUsers {
    fn add_user(&self, name: &str) -> AuthResult<()> {
        let mut names = self.names.write();
        if !names.is_empty() && names.insert(name.to_string()) {
            debug!(target: "winauth", "added {} to allowed users", name);
        }
        Ok(())
    }

    fn delete_user(&self, name: &str) -> AuthResult<()> {
        if self.names.write().remove(name) {
            debug!(target: "winauth", "removed {} from allowed users", name);
        }
        Ok(())
    }

    fn is_restricted(&self) -> bool { !self.names.read().is_empty() }

    fn is_allowed(&self, name: &str) -> bool { self.names.read().contains(name) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_stays_unrestricted() {
        let r = AllowedUsers::default();
        r.add_user("alice").unwrap();
        assert!(!r.is_restricted());
        assert!(r.names().is_empty());
    }

    #[test]
    fn restricted_list_grows_and_shrinks() {
        let r = AllowedUsers::new(vec!["admin".to_string()]);
        r.add_user("alice").unwrap();
        assert!(r.is_allowed("alice"));
        r.delete_user("alice").unwrap();
        assert!(!r.is_allowed("alice"));
        assert_eq!(r.names(), vec!["admin".to_string()]);
    }
}
