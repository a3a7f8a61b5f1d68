use crate::error::OsError;
use crate::platform::AccountDirectory;

/// Local account lookup used to vet add-user requests. Never creates accounts.
pub struct ExistenceChecker<'a, D: AccountDirectory + ?Sized> {
    directory: &'a D,
}

impl<'a, D: AccountDirectory + ?Sized> ExistenceChecker<'a, D> {
    pub fn new(directory: &'a D) -> Self { Self { directory } }

    /// Exact, case-sensitive name match against the enumerated local accounts.
    pub fn user_exists(&self, username: &str) -> Result<bool, OsError> {
        Ok(self.directory.local_users()?.iter().any(|u| u == username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryPlatform;

    #[test]
    fn finds_local_accounts_only() {
        let p = MemoryPlatform::new().with_local_user("alice", "pw").with_domain_user("bob", "CORP", "pw");
        let c = ExistenceChecker::new(&p);
        assert!(c.user_exists("alice").unwrap());
        assert!(!c.user_exists("Alice").unwrap());
        assert!(!c.user_exists("bob").unwrap());
    }

    #[test]
    fn enumeration_failure_propagates() {
        let p = MemoryPlatform::new();
        p.set_fail_user_listing(true);
        assert!(ExistenceChecker::new(&p).user_exists("alice").is_err());
    }
}
