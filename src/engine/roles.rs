//! The professional roles a KD workflow delegates to
//!
//! Role order is part of the contract: [`Role::ALL`] is the insertion order
//! of every built-in table, so display tie-breaks never depend on hash order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A delegate persona the main agent hands work to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Analyst,
    Pm,
    Architect,
    TechLead,
    Engineer,
    Qa,
    Security,
    Devops,
    ReleaseManager,
}

impl Role {
    /// Every role in table order
    pub const ALL: [Role; 9] = [
        Role::Analyst,
        Role::Pm,
        Role::Architect,
        Role::TechLead,
        Role::Engineer,
        Role::Qa,
        Role::Security,
        Role::Devops,
        Role::ReleaseManager,
    ];

    /// Lowercase slug used in tasks, targets and the roster file
    pub fn slug(self) -> &'static str {
        match self {
            Role::Analyst => "analyst",
            Role::Pm => "pm",
            Role::Architect => "architect",
            Role::TechLead => "tech-lead",
            Role::Engineer => "engineer",
            Role::Qa => "qa",
            Role::Security => "security",
            Role::Devops => "devops",
            Role::ReleaseManager => "release-manager",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.slug() == slug)
    }

    /// Agent id used for synthesized events (`<slug>-agent`)
    pub fn agent_id(self) -> String {
        format!("{}-agent", self.slug())
    }

    /// Display title written into the `role` field of synthesized events
    pub fn title(self) -> &'static str {
        match self {
            Role::Analyst => "Analyst",
            Role::Pm => "Product Manager",
            Role::Architect => "Architect",
            Role::TechLead => "Tech Lead",
            Role::Engineer => "Engineer",
            Role::Qa => "QA",
            Role::Security => "Security",
            Role::Devops => "DevOps",
            Role::ReleaseManager => "Release Manager",
        }
    }

    /// Roster name when the project roster does not rename this role
    pub fn default_name(self) -> &'static str {
        match self {
            Role::Pm => "PM",
            other => other.title(),
        }
    }

    /// Action shown for a delegate that is busy with inferred work
    pub fn delegated_action(self) -> &'static str {
        match self {
            Role::Engineer => "typing",
            Role::Qa | Role::Security | Role::Analyst | Role::Architect => "reading",
            Role::Devops => "running",
            _ => "working",
        }
    }

    /// Does free-text role label `text` (already lowercase) name this role?
    ///
    /// Matches the slug as-is or with hyphens read as spaces, so
    /// "Tech Lead" counts for `tech-lead`.
    pub fn named_in(self, text: &str) -> bool {
        let slug = self.slug();
        text.contains(slug) || text.contains(&slug.replace('-', " "))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Insertion-ordered set of roles
///
/// Membership is what inference guarantees; the order only decides which
/// synthesized agent comes first when everything else ties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(Vec<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role, keeping the first insertion position
    pub fn insert(&mut self, role: Role) -> bool {
        if self.0.contains(&role) {
            false
        } else {
            self.0.push(role);
            true
        }
    }

    pub fn extend(&mut self, roles: impl IntoIterator<Item = Role>) {
        for role in roles {
            self.insert(role);
        }
    }

    #[cfg(test)]
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// Order-independent comparison
    #[cfg(test)]
    pub fn same_members(&self, roles: &[Role]) -> bool {
        self.len() == roles.iter().collect::<std::collections::HashSet<_>>().len()
            && roles.iter().all(|r| self.contains(*r))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for RoleSet {
    type Item = Role;
    type IntoIter = std::vec::IntoIter<Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_slug(role.slug()), Some(role));
        }
        assert_eq!(Role::from_slug("wizard"), None);
    }

    #[test]
    fn test_agent_ids_and_names() {
        assert_eq!(Role::TechLead.agent_id(), "tech-lead-agent");
        assert_eq!(Role::Pm.title(), "Product Manager");
        assert_eq!(Role::Pm.default_name(), "PM");
        assert_eq!(Role::Devops.default_name(), "DevOps");
    }

    #[test]
    fn test_delegated_actions() {
        let cases = [
            (Role::Engineer, "typing"),
            (Role::Qa, "reading"),
            (Role::Architect, "reading"),
            (Role::Devops, "running"),
            (Role::Pm, "working"),
            (Role::ReleaseManager, "working"),
        ];
        for (role, expected) in cases {
            assert_eq!(role.delegated_action(), expected, "role: {role}");
        }
    }

    #[test]
    fn test_named_in_accepts_spaced_slug() {
        assert!(Role::TechLead.named_in("tech lead"));
        assert!(Role::TechLead.named_in("senior tech-lead"));
        assert!(Role::Security.named_in("security"));
        assert!(!Role::Architect.named_in("master agent"));
    }

    #[test]
    fn test_role_set_keeps_first_position() {
        let mut set = RoleSet::new();
        assert!(set.insert(Role::Qa));
        assert!(set.insert(Role::Pm));
        assert!(!set.insert(Role::Qa));

        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Role::Qa, Role::Pm]);
        assert!(set.same_members(&[Role::Pm, Role::Qa]));
        assert!(!set.same_members(&[Role::Pm]));
    }

    #[test]
    fn test_serde_uses_slugs() {
        let json = serde_json::to_string(&Role::ReleaseManager).unwrap();
        assert_eq!(json, "\"release-manager\"");
        let role: Role = serde_json::from_str("\"tech-lead\"").unwrap();
        assert_eq!(role, Role::TechLead);
    }
}
