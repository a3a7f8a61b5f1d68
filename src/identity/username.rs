/// Domain sentinel for accounts in the local machine's own store.
pub const LOCAL_DOMAIN: &str = ".";

/// Names with an `@` are resolved by an external domain authority.
pub fn is_domain_qualified(username: &str) -> bool {
    username.contains('@')
}

/// Split `user@domain` into its parts; plain names get the local sentinel.
/// Only the first `@` separates, anything after it belongs to the domain.
pub fn split_username(username: &str) -> (&str, &str) {
    match username.split_once('@') {
        Some((local, domain)) => (local, domain),
        None => (username, LOCAL_DOMAIN),
    }
}

/// Append `@domain` to an unqualified name. Empty `domain` leaves the name alone.
pub fn qualify(username: &str, domain: &str) -> String {
    if domain.is_empty() || is_domain_qualified(username) {
        username.to_string()
    } else {
        format!("{}@{}", username, domain)
    }
}
