use tracing::warn;

use crate::platform::AccountDirectory;

/// Local group allow-list check.
pub struct MembershipChecker<'a, D: AccountDirectory + ?Sized> {
    directory: &'a D,
    groups: &'a [String],
}

impl<'a, D: AccountDirectory + ?Sized> MembershipChecker<'a, D> {
    pub fn new(directory: &'a D, groups: &'a [String]) -> Self { Self { directory, groups } }

    /// True once any configured group lists `username` as a member.
    /// An empty allow-list answers false; callers treat that case as unrestricted.
    /// A group whose lookup fails counts as no match and the scan continues.
    pub fn is_member(&self, username: &str) -> bool {
        for group in self.groups {
            let members = match self.directory.local_group_members(group) {
                Ok(m) => m,
                Err(e) => {
                    warn!(target: "winauth", "Failed to get group members for {}: {}", group, e);
                    continue;
                }
            };
            if members.iter().any(|m| m == username) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MemoryPlatform, OsCall};

    fn groups(names: &[&str]) -> Vec<String> { names.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn empty_allow_list_is_false_without_os_calls() {
        let p = MemoryPlatform::new().with_group("admins", &["alice"]);
        let g = groups(&[]);
        assert!(!MembershipChecker::new(&p, &g).is_member("alice"));
        assert!(p.calls().is_empty());
    }

    #[test]
    fn member_found_despite_failing_group() {
        let p = MemoryPlatform::new().with_group("admins", &["alice"]);
        let g = groups(&["ghosts", "admins"]);
        assert!(MembershipChecker::new(&p, &g).is_member("alice"));
    }

    #[test]
    fn stops_at_first_match() {
        let p = MemoryPlatform::new().with_group("admins", &["alice"]).with_group("users", &["alice"]);
        let g = groups(&["admins", "users"]);
        assert!(MembershipChecker::new(&p, &g).is_member("alice"));
        assert_eq!(p.calls(), vec![OsCall::GroupMembers { group: "admins".into() }]);
    }

    #[test]
    fn non_member_is_false_after_all_groups() {
        let p = MemoryPlatform::new().with_group("admins", &["alice"]);
        let g = groups(&["admins", "ghosts"]);
        assert!(!MembershipChecker::new(&p, &g).is_member("mallory"));
        assert_eq!(p.calls().len(), 2);
    }
}
