//! Policy catalogs: the static resources, roles and rules pushed to the PDP
//! once at setup time.
//!
//! A catalog is a TOML document. Three catalogs ship with the binary:
//!
//! | Name | Shape |
//! |---|---|
//! | `perimeters` | ABAC rules for the four perimeters (opt-in, clearance) |
//! | `tiers` | RBAC free/premium tiers |
//! | `certification` | RBAC general/professional/expert advisors |
//!
//! The gates never read a catalog; it only describes what the PDP must know
//! for their checks to be answerable.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const PERIMETERS: &str = include_str!("../catalogs/perimeters.toml");
const TIERS: &str = include_str!("../catalogs/tiers.toml");
const CERTIFICATION: &str = include_str!("../catalogs/certification.toml");

pub const BUILTIN_CATALOGS: [&str; 3] = ["perimeters", "tiers", "certification"];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown built-in catalog '{0}' (expected one of: perimeters, tiers, certification)")]
    UnknownBuiltin(String),

    #[error("Failed to read catalog at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse catalog '{name}': {reason}")]
    Parse { name: String, reason: String },

    #[error("Invalid catalog '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Number,
    Bool,
    Array,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub actions: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDef {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `resource:action` pairs.
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionSetKind {
    UserSet,
    ResourceSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSetDef {
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ConditionSetKind,
    /// Required for resource sets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Condition tree in the PDP's JSON condition language.
    pub conditions: serde_json::Value,
}

/// Grants `permission` to members of `user_set` on members of `resource_set`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRuleDef {
    pub user_set: String,
    pub permission: String,
    pub resource_set: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedUser {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCatalog {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceDef>,
    #[serde(default, rename = "role")]
    pub roles: Vec<RoleDef>,
    #[serde(default, rename = "condition_set")]
    pub condition_sets: Vec<ConditionSetDef>,
    #[serde(default, rename = "set_rule")]
    pub set_rules: Vec<SetRuleDef>,
    #[serde(default, rename = "user")]
    pub users: Vec<SeedUser>,
}

impl PolicyCatalog {
    pub fn builtin(name: &str) -> Result<Self, CatalogError> {
        let source = match name {
            "perimeters" => PERIMETERS,
            "tiers" => TIERS,
            "certification" => CERTIFICATION,
            other => return Err(CatalogError::UnknownBuiltin(other.to_string())),
        };
        Self::parse(name, source)
    }

    /// Resolve a catalog source: a built-in name, otherwise a file path.
    pub fn load(source: &str) -> Result<Self, CatalogError> {
        if BUILTIN_CATALOGS.contains(&source) {
            return Self::builtin(source);
        }
        Self::load_from(Path::new(source))
    }

    pub fn load_from(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&path.display().to_string(), &content)
    }

    pub fn parse(name: &str, content: &str) -> Result<Self, CatalogError> {
        let catalog: Self = toml::from_str(content).map_err(|e| CatalogError::Parse {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn resource(&self, key: &str) -> Option<&ResourceDef> {
        self.resources.iter().find(|r| r.key == key)
    }

    pub fn role(&self, key: &str) -> Option<&RoleDef> {
        self.roles.iter().find(|r| r.key == key)
    }

    fn invalid(&self, reason: String) -> CatalogError {
        CatalogError::Invalid {
            name: self.name.clone(),
            reason,
        }
    }

    fn check_permission(&self, permission: &str, context: &str) -> Result<(), CatalogError> {
        let (resource, action) = permission
            .split_once(':')
            .ok_or_else(|| self.invalid(format!("{context}: '{permission}' is not resource:action")))?;
        let def = self
            .resource(resource)
            .ok_or_else(|| self.invalid(format!("{context}: unknown resource '{resource}'")))?;
        if !def.actions.iter().any(|a| a == action) {
            return Err(self.invalid(format!(
                "{context}: resource '{resource}' has no action '{action}'"
            )));
        }
        Ok(())
    }

    /// Structural consistency: unique keys, and every reference resolves.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = BTreeSet::new();
        for resource in &self.resources {
            if !seen.insert(resource.key.as_str()) {
                return Err(self.invalid(format!("duplicate resource '{}'", resource.key)));
            }
            if resource.actions.is_empty() {
                return Err(self.invalid(format!("resource '{}' has no actions", resource.key)));
            }
        }

        let mut seen = BTreeSet::new();
        for role in &self.roles {
            if !seen.insert(role.key.as_str()) {
                return Err(self.invalid(format!("duplicate role '{}'", role.key)));
            }
            for permission in &role.permissions {
                self.check_permission(permission, &format!("role '{}'", role.key))?;
            }
        }

        let mut sets = BTreeMap::new();
        for set in &self.condition_sets {
            if sets.insert(set.key.as_str(), set.kind).is_some() {
                return Err(self.invalid(format!("duplicate condition set '{}'", set.key)));
            }
            if set.kind == ConditionSetKind::ResourceSet {
                let resource_type = set.resource_type.as_deref().ok_or_else(|| {
                    self.invalid(format!("resource set '{}' needs a resource_type", set.key))
                })?;
                if self.resource(resource_type).is_none() {
                    return Err(self.invalid(format!(
                        "resource set '{}': unknown resource '{resource_type}'",
                        set.key
                    )));
                }
            }
        }

        for rule in &self.set_rules {
            let context = format!("set rule {} -> {}", rule.user_set, rule.resource_set);
            match sets.get(rule.user_set.as_str()) {
                Some(ConditionSetKind::UserSet) => {}
                _ => return Err(self.invalid(format!("{context}: '{}' is not a user set", rule.user_set))),
            }
            match sets.get(rule.resource_set.as_str()) {
                Some(ConditionSetKind::ResourceSet) => {}
                _ => {
                    return Err(self.invalid(format!(
                        "{context}: '{}' is not a resource set",
                        rule.resource_set
                    )));
                }
            }
            self.check_permission(&rule.permission, &context)?;
        }

        for user in &self.users {
            for role in &user.roles {
                if self.role(role).is_none() {
                    return Err(self.invalid(format!("user '{}': unknown role '{role}'", user.key)));
                }
            }
        }

        Ok(())
    }

    /// One-line-per-item summary for `advisorguard catalog`.
    pub fn summary(&self) -> String {
        let mut out = format!("Catalog: {}\n", self.name);
        if !self.description.is_empty() {
            out.push_str(&format!("  {}\n", self.description));
        }
        out.push_str(&format!("\nResources ({}):\n", self.resources.len()));
        for r in &self.resources {
            out.push_str(&format!("  {:<20} {}\n", r.key, r.actions.join(", ")));
        }
        out.push_str(&format!("\nRoles ({}):\n", self.roles.len()));
        for r in &self.roles {
            out.push_str(&format!("  {:<20} {}\n", r.key, r.permissions.join(", ")));
        }
        if !self.condition_sets.is_empty() {
            out.push_str(&format!("\nCondition sets ({}):\n", self.condition_sets.len()));
            for s in &self.condition_sets {
                let kind = match s.kind {
                    ConditionSetKind::UserSet => "user set",
                    ConditionSetKind::ResourceSet => "resource set",
                };
                out.push_str(&format!("  {:<20} {kind}\n", s.key));
            }
        }
        if !self.set_rules.is_empty() {
            out.push_str(&format!("\nSet rules ({}):\n", self.set_rules.len()));
            for rule in &self.set_rules {
                out.push_str(&format!(
                    "  {} may {} {}\n",
                    rule.user_set, rule.permission, rule.resource_set
                ));
            }
        }
        if !self.users.is_empty() {
            out.push_str(&format!("\nSeed users ({}):\n", self.users.len()));
            for u in &self.users {
                out.push_str(&format!("  {:<28} {}\n", u.key, u.roles.join(", ")));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_catalogs_are_valid() {
        for name in BUILTIN_CATALOGS {
            let catalog = PolicyCatalog::builtin(name).unwrap();
            assert_eq!(catalog.name, name);
            assert!(!catalog.resources.is_empty());
            assert!(!catalog.roles.is_empty());
        }
    }

    #[test]
    fn perimeters_catalog_covers_every_gate() {
        let catalog = PolicyCatalog::builtin("perimeters").unwrap();
        let expected = [
            ("financial_advice", "receive"),
            ("financial_analysis", "analyze_portfolio"),
            ("financial_document", "read"),
            ("documentation", "access_professional_docs"),
            ("financial_action", "recommend"),
            ("portfolio", "update"),
            ("api", "access"),
            ("financial_response", "requires_disclaimer"),
            ("response", "compliance_validation"),
        ];
        for (resource, action) in expected {
            let def = catalog.resource(resource).unwrap_or_else(|| panic!("missing {resource}"));
            assert!(def.actions.iter().any(|a| a == action), "{resource} lacks {action}");
        }
        assert!(catalog.users.iter().any(|u| u.key == "user@example.com"));
    }

    #[test]
    fn certification_roles_nest() {
        let catalog = PolicyCatalog::builtin("certification").unwrap();
        let general = catalog.role("general_advisor").unwrap();
        let expert = catalog.role("expert_advisor").unwrap();
        assert!(!general.permissions.contains(&"financial_action:recommend".to_string()));
        assert!(expert.permissions.contains(&"financial_action:recommend".to_string()));
        assert!(general.permissions.iter().all(|p| expert.permissions.contains(p)));
    }

    #[test]
    fn unknown_builtin_is_rejected() {
        assert!(matches!(
            PolicyCatalog::builtin("enterprise"),
            Err(CatalogError::UnknownBuiltin(_))
        ));
    }

    #[test]
    fn role_with_unknown_action_is_invalid() {
        let toml = r#"
name = "broken"

[[resource]]
key = "portfolio"
name = "Portfolio"
actions = ["read"]

[[role]]
key = "trader"
name = "Trader"
permissions = ["portfolio:update"]
"#;
        let err = PolicyCatalog::parse("broken", toml).unwrap_err();
        assert!(err.to_string().contains("no action 'update'"));
    }

    #[test]
    fn set_rule_must_reference_sets() {
        let toml = r#"
name = "broken"

[[resource]]
key = "financial_document"
name = "Document"
actions = ["read"]

[[condition_set]]
key = "public_documents"
name = "Public"
type = "resource_set"
resource_type = "financial_document"
conditions = { allOf = [ { "resource.classification" = { equals = "public" } } ] }

[[set_rule]]
user_set = "nobody"
permission = "financial_document:read"
resource_set = "public_documents"
"#;
        let err = PolicyCatalog::parse("broken", toml).unwrap_err();
        assert!(err.to_string().contains("'nobody' is not a user set"));
    }

    #[test]
    fn load_resolves_paths() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
name = "custom"

[[resource]]
key = "api"
name = "API"
actions = ["access"]
attributes = {{ endpoint = {{ type = "string" }} }}
"#
        )
        .unwrap();

        let catalog = PolicyCatalog::load(&file.path().display().to_string()).unwrap();
        assert_eq!(catalog.name, "custom");
        let api = catalog.resource("api").unwrap();
        assert_eq!(api.attributes["endpoint"].attribute_type, AttributeType::String);
    }

    #[test]
    fn summary_lists_roles() {
        let summary = PolicyCatalog::builtin("tiers").unwrap().summary();
        assert!(summary.contains("free_tier"));
        assert!(summary.contains("premium_tier"));
    }
}
