use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Authenticator settings, read once at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthenticatorConfig {
    /// Local groups whose members may log in. Empty means no group restriction.
    pub group_whitelist: Vec<String>,
    /// Explicit user allow-list kept by the hub. Empty means no user restriction.
    pub allowed_users: Vec<String>,
    /// Load the user's OS profile when a workload starts and unload it when it stops.
    /// Creates USERPROFILE/APPDATA on first use; needs the restore and backup privileges.
    pub open_sessions: bool,
    /// Turn `open_sessions` off for the rest of the process after a profile load failure.
    pub disable_open_sessions_after_failure: bool,
    /// Domain appended as `user@domain` when the typed name has none. Empty disables it.
    pub domain_to_add_to_username: String,
    /// Alias -> canonical username.
    pub username_map: HashMap<String, String>,
    /// Requests account creation for unknown local users. Always rejected on this platform.
    pub create_system_users: bool,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            group_whitelist: Vec::new(),
            allowed_users: Vec::new(),
            open_sessions: true,
            disable_open_sessions_after_failure: true,
            domain_to_add_to_username: String::new(),
            username_map: HashMap::new(),
            create_system_users: false,
        }
    }
}

impl AuthenticatorConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut cfg: AuthenticatorConfig = serde_json::from_str(text).context("invalid authenticator config json")?;
        cfg.normalize();
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading authenticator config {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Build from the process environment.
    /// `WINAUTH_CONFIG` names a json file used as the base; the remaining variables override it.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var("WINAUTH_CONFIG") {
            Ok(p) if !p.trim().is_empty() => Self::from_json_file(Path::new(p.trim()))?,
            _ => Self::default(),
        };
        if let Ok(v) = std::env::var("WINAUTH_OPEN_SESSIONS") {
            cfg.open_sessions = parse_bool(&v).with_context(|| format!("WINAUTH_OPEN_SESSIONS='{}'", v))?;
        }
        if let Ok(v) = std::env::var("WINAUTH_GROUP_WHITELIST") {
            cfg.group_whitelist = split_list(&v);
        }
        if let Ok(v) = std::env::var("WINAUTH_DOMAIN") {
            cfg.domain_to_add_to_username = v.trim().to_string();
        }
        cfg.normalize();
        Ok(cfg)
    }

    /// Trim names and drop empty or repeated entries, keeping first-seen order.
    pub fn normalize(&mut self) {
        dedup_in_order(&mut self.group_whitelist);
        dedup_in_order(&mut self.allowed_users);
        self.domain_to_add_to_username = self.domain_to_add_to_username.trim().to_string();
    }
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for raw in items.drain(..) {
        let name = raw.trim().to_string();
        if name.is_empty() { continue; }
        if seen.insert(name.clone()) { out.push(name); }
    }
    *items = out;
}

fn split_list(s: &str) -> Vec<String> {
    let mut v: Vec<String> = s.split(',').map(|p| p.to_string()).collect();
    dedup_in_order(&mut v);
    v
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("not a boolean: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_open_sessions() {
        let cfg = AuthenticatorConfig::default();
        assert!(cfg.open_sessions);
        assert!(cfg.disable_open_sessions_after_failure);
        assert!(cfg.group_whitelist.is_empty());
        assert!(!cfg.create_system_users);
    }

    #[test]
    fn json_partial_keeps_defaults() {
        let cfg = AuthenticatorConfig::from_json_str(r#"{
            "group_whitelist": ["admins", " admins", "", "users"],
            "username_map": {"al": "alice"}
        }"#).unwrap();
        assert_eq!(cfg.group_whitelist, vec!["admins".to_string(), "users".to_string()]);
        assert_eq!(cfg.username_map.get("al").map(|s| s.as_str()), Some("alice"));
        assert!(cfg.open_sessions);
    }

    #[test]
    fn json_rejects_wrong_types() {
        assert!(AuthenticatorConfig::from_json_str(r#"{"open_sessions": "maybe"}"#).is_err());
    }

    #[test]
    fn bool_parsing() {
        assert!(parse_bool(" Yes ").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("perhaps").is_err());
    }

    #[test]
    fn list_splitting() {
        assert_eq!(split_list("a, b,,a"), vec!["a".to_string(), "b".to_string()]);
    }
}
