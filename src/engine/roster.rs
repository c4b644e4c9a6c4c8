//! Project roster: display names the installer gave each role
//!
//! Read-only. A missing or broken roster file is never an error; every role
//! simply keeps its built-in name.

use super::Role;
use std::collections::BTreeMap;
use std::path::Path;

/// Role slug -> display name for the current project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    by_role: BTreeMap<Role, String>,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            by_role: Role::ALL
                .into_iter()
                .map(|role| (role, role.default_name().to_string()))
                .collect(),
        }
    }
}

impl Roster {
    /// Load `agents.json`, falling back to defaults on any problem
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Roster not found, using default names");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read roster, using default names");
                return Self::default();
            }
        };

        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse roster, using default names");
                Self::default()
            }
        }
    }

    /// Merge a `{"byRole": {...}}` document over the defaults
    ///
    /// Blank names, non-string names and unknown slugs are ignored.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut roster = Self::default();
        let Some(by_role) = value.get("byRole").and_then(|v| v.as_object()) else {
            return roster;
        };

        for (slug, name) in by_role {
            let Some(role) = Role::from_slug(slug) else {
                tracing::debug!(slug = %slug, "Ignoring roster entry for unknown role");
                continue;
            };
            if let Some(name) = name.as_str().map(str::trim).filter(|n| !n.is_empty()) {
                roster.by_role.insert(role, name.to_string());
            }
        }
        roster
    }

    /// Display name for a role
    pub fn name(&self, role: Role) -> &str {
        self.by_role
            .get(&role)
            .map_or_else(|| role.default_name(), String::as_str)
    }

    /// Roles whose display name equals `name`, ignoring case
    pub fn roles_named<'a>(&'a self, name: &str) -> impl Iterator<Item = Role> + 'a {
        let wanted = name.trim().to_lowercase();
        self.by_role
            .iter()
            .filter(move |(_, n)| n.trim().to_lowercase() == wanted)
            .map(|(role, _)| *role)
    }

    /// Override a single display name
    #[cfg(test)]
    pub fn with_name(mut self, role: Role, name: &str) -> Self {
        self.by_role.insert(role, name.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let roster = Roster::default();
        assert_eq!(roster.name(Role::Pm), "PM");
        assert_eq!(roster.name(Role::TechLead), "Tech Lead");
    }

    #[test]
    fn test_from_json_merges_and_filters() {
        let roster = Roster::from_json(&json!({
            "byRole": {
                "engineer": "  Ezra ",
                "qa": "",
                "security": 42,
                "wizard": "Merlin"
            }
        }));
        assert_eq!(roster.name(Role::Engineer), "Ezra");
        assert_eq!(roster.name(Role::Qa), "QA");
        assert_eq!(roster.name(Role::Security), "Security");
    }

    #[test]
    fn test_from_json_without_by_role() {
        assert_eq!(Roster::from_json(&json!([1, 2])), Roster::default());
        assert_eq!(Roster::from_json(&json!({"byRole": "x"})), Roster::default());
    }

    #[test]
    fn test_load_missing_and_broken_files() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Roster::load(&dir.path().join("agents.json")), Roster::default());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Roster::load(&path), Roster::default());
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agents.json");
        std::fs::write(&path, r#"{"byRole":{"analyst":"Adi"}}"#).unwrap();

        let roster = Roster::load(&path);
        assert_eq!(roster.name(Role::Analyst), "Adi");
    }

    #[test]
    fn test_roles_named_is_case_insensitive() {
        let roster = Roster::default().with_name(Role::Security, "Sari");
        let roles: Vec<Role> = roster.roles_named("sari").collect();
        assert_eq!(roles, vec![Role::Security]);
        assert_eq!(roster.roles_named("nobody").count(), 0);
    }
}
