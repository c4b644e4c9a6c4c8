//! Role inference from task tokens, free text and delegation targets
//!
//! All matching is table-driven. The built-in tables reproduce the stock KD
//! workflow; a project can replace either table from `observer.toml`.
//! Table order is significant only for the order roles come out in, never
//! for membership.

use super::{Role, RoleSet, Roster};
use once_cell::sync::Lazy;
use serde::Deserialize;

/// Prefix of task tokens that name their role directly (`kd-role-qa`)
const ROLE_TASK_PREFIX: &str = "kd-role-";

/// Characters that separate role tokens in `target_agent_id`
const TARGET_SEPARATORS: [char; 4] = [',', ';', '|', '\n'];

/// One `[[inference.task]]` entry: a workflow token and the roles it delegates to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskEntry {
    pub token: String,
    pub roles: Vec<Role>,
}

/// One `[[inference.hint]]` entry: keywords whose presence implies a role
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HintEntry {
    pub role: Role,
    pub keywords: Vec<String>,
}

static DEFAULT_TASKS: Lazy<Vec<TaskEntry>> = Lazy::new(|| {
    use Role::*;
    let table: [(&str, &[Role]); 17] = [
        ("kd-analyze", &[Analyst]),
        ("kd-brainstorm", &[Analyst, Pm]),
        ("kd-prd", &[Pm]),
        ("kd-arch", &[Architect, Security]),
        ("kd-story", &[TechLead]),
        ("kd-dev-story", &[Engineer]),
        ("kd-code-review", &[Qa, Security]),
        ("kd-deploy", &[Devops]),
        ("kd-release", &[ReleaseManager]),
        ("kd-api-design", &[Architect]),
        ("kd-db-schema", &[Architect]),
        ("kd-test", &[Qa]),
        ("kd-security-audit", &[Security]),
        ("kd-refactor", &[TechLead, Engineer]),
        ("kd-sprint-planning", &[Pm, TechLead]),
        ("kd-sprint-review", &[Pm, Qa]),
        ("kd-validate", &[Qa]),
    ];
    table
        .into_iter()
        .map(|(token, roles)| TaskEntry {
            token: token.to_string(),
            roles: roles.to_vec(),
        })
        .collect()
});

static DEFAULT_HINTS: Lazy<Vec<HintEntry>> = Lazy::new(|| {
    use Role::*;
    let table: [(Role, &[&str]); 9] = [
        (Analyst, &["analyst", "analysis", "discover", "research", "stakeholder"]),
        (Pm, &["pm", "product manager", "prd", "roadmap", "backlog"]),
        (
            Architect,
            &["architect", "architecture", "system design", "api design", "db schema"],
        ),
        (TechLead, &["tech lead", "tl", "lead", "story breakdown", "refactor"]),
        (
            Engineer,
            &["engineer", "developer", "dev story", "implement", "coding", "code"],
        ),
        (Qa, &["qa", "quality", "testing", "test"]),
        (Security, &["security", "audit", "owasp", "vulnerability"]),
        (Devops, &["devops", "deploy", "deployment", "ci/cd", "pipeline"]),
        (ReleaseManager, &["release manager", "release", "changelog"]),
    ];
    table
        .into_iter()
        .map(|(role, keywords)| HintEntry {
            role,
            keywords: keywords.iter().map(ToString::to_string).collect(),
        })
        .collect()
});

/// The data-driven inference policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceTables {
    tasks: Vec<TaskEntry>,
    hints: Vec<HintEntry>,
}

impl Default for InferenceTables {
    fn default() -> Self {
        Self {
            tasks: DEFAULT_TASKS.clone(),
            hints: DEFAULT_HINTS.clone(),
        }
    }
}

impl InferenceTables {
    /// Build tables from configured entries; an empty list keeps the built-in table
    pub fn from_entries(tasks: Vec<TaskEntry>, hints: Vec<HintEntry>) -> Self {
        let mut tables = Self::default();
        if !tasks.is_empty() {
            tables.tasks = tasks
                .into_iter()
                .map(|entry| TaskEntry {
                    token: normalize_task(&entry.token).unwrap_or_default(),
                    roles: entry.roles,
                })
                .filter(|entry| !entry.token.is_empty())
                .collect();
        }
        if !hints.is_empty() {
            tables.hints = hints
                .into_iter()
                .map(|entry| HintEntry {
                    role: entry.role,
                    keywords: entry
                        .keywords
                        .iter()
                        .map(|k| k.trim().to_lowercase())
                        .filter(|k| !k.is_empty())
                        .collect(),
                })
                .collect();
        }
        tables
    }

    /// Roles a workflow task token delegates to
    ///
    /// The token is normalized first (see [`normalize_task`]). An exact table
    /// hit wins; `kd-role-<slug>` names its role; otherwise every entry whose
    /// token is contained in the normalized token contributes its roles.
    pub fn roles_for_task(&self, task: &str) -> RoleSet {
        let Some(token) = normalize_task(task) else {
            return RoleSet::new();
        };

        if let Some(entry) = self.tasks.iter().find(|e| e.token == token) {
            return entry.roles.iter().copied().collect();
        }

        if let Some(slug) = token.strip_prefix(ROLE_TASK_PREFIX) {
            return Role::from_slug(slug).into_iter().collect();
        }

        self.tasks
            .iter()
            .filter(|e| token.contains(e.token.as_str()))
            .flat_map(|e| e.roles.iter().copied())
            .collect()
    }

    /// Every role with at least one keyword present in `text`, in table order
    pub fn roles_from_text(&self, text: &str) -> RoleSet {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return RoleSet::new();
        }
        self.hints
            .iter()
            .filter(|h| h.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|h| h.role)
            .collect()
    }

    /// Resolve a `target_agent_id` value to roles
    ///
    /// Each `, ; |` or newline separated segment is tried as a role slug or
    /// `<slug>-agent`, then as a roster display name, then as free text.
    pub fn roles_from_target(&self, target: &str, roster: &Roster) -> RoleSet {
        let target = target.trim().to_lowercase();
        let mut roles = RoleSet::new();
        if target.is_empty() {
            return roles;
        }

        for segment in target
            .split(TARGET_SEPARATORS)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            roles.extend(Role::from_slug(
                segment.strip_suffix("-agent").unwrap_or(segment),
            ));
            roles.extend(roster.roles_named(segment));
            roles.extend(self.roles_from_text(segment));
        }
        roles
    }
}

/// Normalize a task reference to its bare token
///
/// `"/kd_arch.md now"` -> `"kd-arch"`. Returns `None` for blank input.
pub fn normalize_task(task: &str) -> Option<String> {
    let lower = task.trim().to_lowercase();
    let first = lower.split_whitespace().next()?;
    let token = first.trim_start_matches('/');
    let token = token.strip_suffix(".md").unwrap_or(token);
    let token = match token.strip_prefix("kd_") {
        Some(rest) => format!("kd-{rest}"),
        None => token.to_string(),
    };
    (!token.is_empty()).then_some(token)
}
