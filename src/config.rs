// Migration config file: loading and structural validation.
//
// The file is checked key by key before anything is mapped onto typed
// structs, so a broken file is reported with the section that is wrong.
// Values are not type-checked; resource switches follow JSON truthiness.

use crate::error::ConfigError;
use crate::resource::{ResourceKind, MIGRATION_ORDER};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

const RESOURCE_SECTION: &str = "Apigee-resource";
const ORGANIZATION_SECTION: &str = "Organization";
const ALL_KEYS: [&str; 3] = ["Proxy", "Shareflow", "TargetServers"];
const SPECIFIC_KEYS: [&str; 3] = ["proxy", "sharedflow", "targetServer"];
const ORG_KEYS: [&str; 2] = ["org-name", "environment"];

/// One side of the migration: an organization and one of its environments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrganizationConfig {
    pub org_name: String,
    pub environment: String,
}

/// Resource types enabled by the `All` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResourceSelection {
    pub proxy: bool,
    pub shared_flow: bool,
    pub target_servers: bool,
    pub api_products: bool,
}

/// Names listed in the `Specific` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SpecificResources {
    pub proxy: Vec<String>,
    pub shared_flow: Vec<String>,
    pub target_server: Vec<String>,
}

/// The validated, immutable configuration of one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationConfig {
    pub from: OrganizationConfig,
    pub to: OrganizationConfig,
    pub all: ResourceSelection,
    pub specific: SpecificResources,
}

impl ResourceSelection {
    pub fn is_enabled(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::TargetServer => self.target_servers,
            ResourceKind::SharedFlow => self.shared_flow,
            ResourceKind::Proxy => self.proxy,
            ResourceKind::ApiProduct => self.api_products,
        }
    }

    /// Enabled kinds in migration order.
    pub fn enabled(&self) -> Vec<ResourceKind> {
        MIGRATION_ORDER
            .into_iter()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }
}

impl MigrationConfig {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: Value = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(&raw)
    }

    /// Validate an already parsed config document.
    pub fn from_value(raw: &Value) -> Result<Self, ConfigError> {
        let root = raw
            .as_object()
            .ok_or_else(|| ConfigError::invalid("top level must be a JSON object"))?;
        if !root.contains_key(RESOURCE_SECTION) || !root.contains_key(ORGANIZATION_SECTION) {
            return Err(ConfigError::invalid(format!(
                "Missing required key(s): expected \"{RESOURCE_SECTION}\" and \"{ORGANIZATION_SECTION}\""
            )));
        }

        let resources = object(&root[RESOURCE_SECTION], RESOURCE_SECTION)?;
        let (Some(all), Some(specific)) = (
            resources.get("All").filter(|v| truthy(v)),
            resources.get("Specific").filter(|v| truthy(v)),
        ) else {
            return Err(ConfigError::invalid(format!(
                "Missing \"All\" or \"Specific\" section in \"{RESOURCE_SECTION}\""
            )));
        };

        let all = object(all, "All")?;
        if !ALL_KEYS.iter().all(|k| all.contains_key(*k)) {
            return Err(ConfigError::invalid(format!(
                "Incorrect keys in \"All\" section: expected {}",
                ALL_KEYS.join(", ")
            )));
        }
        let specific = object(specific, "Specific")?;
        if !SPECIFIC_KEYS.iter().all(|k| specific.contains_key(*k)) {
            return Err(ConfigError::invalid(format!(
                "Incorrect keys in \"Specific\" section: expected {}",
                SPECIFIC_KEYS.join(", ")
            )));
        }

        let organization = object(&root[ORGANIZATION_SECTION], ORGANIZATION_SECTION)?;
        let (Some(from), Some(to)) = (organization.get("From"), organization.get("To")) else {
            return Err(ConfigError::invalid(format!(
                "Missing \"From\" or \"To\" section in \"{ORGANIZATION_SECTION}\""
            )));
        };

        Ok(MigrationConfig {
            from: organization_side(from, "From")?,
            to: organization_side(to, "To")?,
            all: ResourceSelection {
                proxy: flag(all, "Proxy"),
                // "Sharedflow" is accepted as an alias of the validated key
                shared_flow: flag(all, "Shareflow") || flag(all, "Sharedflow"),
                target_servers: flag(all, "TargetServers"),
                api_products: flag(all, "ApiProducts"),
            },
            specific: SpecificResources {
                proxy: names(&specific["proxy"]),
                shared_flow: names(&specific["sharedflow"]),
                target_server: names(&specific["targetServer"]),
            },
        })
    }
}

fn object<'a>(value: &'a Value, section: &str) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| ConfigError::invalid(format!("\"{section}\" must be an object")))
}

fn organization_side(value: &Value, side: &str) -> Result<OrganizationConfig, ConfigError> {
    let section = format!("{ORGANIZATION_SECTION}.{side}");
    let obj = object(value, &section)?;
    if let Some(missing) = ORG_KEYS.iter().find(|k| !obj.contains_key(**k)) {
        return Err(ConfigError::invalid(format!(
            "Missing \"{missing}\" in \"{section}\""
        )));
    }
    Ok(OrganizationConfig {
        org_name: scalar(&obj["org-name"]),
        environment: scalar(&obj["environment"]),
    })
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flag(section: &Map<String, Value>, key: &str) -> bool {
    section.get(key).is_some_and(truthy)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A `Specific` entry may be a list of names or a single name.
fn names(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter(|v| truthy(v)).map(scalar).collect(),
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}
