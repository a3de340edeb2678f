// Resource descriptors: one table entry per migratable resource type.
//
// Exporters and importers are generic; everything that differs between
// proxies, shared flows, API products and target servers lives here.

use std::fmt;

/// The resource types this tool knows how to migrate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    TargetServer,
    SharedFlow,
    Proxy,
    ApiProduct,
}

/// Fixed processing order for both the export and the import phase.
pub const MIGRATION_ORDER: [ResourceKind; 4] = [
    ResourceKind::TargetServer,
    ResourceKind::SharedFlow,
    ResourceKind::Proxy,
    ResourceKind::ApiProduct,
];

/// How a resource is represented locally and uploaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payload {
    /// A JSON definition, fetched with GET and created with a JSON POST.
    Definition,
    /// A revisioned zip bundle, downloaded as a stream and uploaded as
    /// multipart with `action=import`, then optionally deployed.
    Bundle,
}

/// Shape of the list response for a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListShape {
    /// A bare JSON array of names.
    Names,
    /// An object holding an array of `{ "name": ... }` objects under a key.
    Objects(&'static str),
}

/// Everything the generic exporter/importer needs to know about a type.
#[derive(Clone, Copy, Debug)]
pub struct ResourceSpec {
    /// Collection segment under the organization (or environment).
    pub collection: &'static str,
    /// Whether the collection lives under `environments/{env}`.
    pub environment_scoped: bool,
    pub list_shape: ListShape,
    pub payload: Payload,
    /// Subdirectory of the staging directory.
    pub staging_dir: &'static str,
    pub label: &'static str,
}

const TARGET_SERVER: ResourceSpec = ResourceSpec {
    collection: "targetservers",
    environment_scoped: true,
    list_shape: ListShape::Names,
    payload: Payload::Definition,
    staging_dir: "TargetServer",
    label: "target server",
};

const SHARED_FLOW: ResourceSpec = ResourceSpec {
    collection: "sharedflows",
    environment_scoped: false,
    list_shape: ListShape::Objects("sharedFlows"),
    payload: Payload::Bundle,
    staging_dir: "sharedflows",
    label: "shared flow",
};

const PROXY: ResourceSpec = ResourceSpec {
    collection: "apis",
    environment_scoped: false,
    list_shape: ListShape::Objects("proxies"),
    payload: Payload::Bundle,
    staging_dir: "proxies",
    label: "proxy",
};

const API_PRODUCT: ResourceSpec = ResourceSpec {
    collection: "apiproducts",
    environment_scoped: false,
    list_shape: ListShape::Objects("apiProduct"),
    payload: Payload::Definition,
    staging_dir: "APIProducts",
    label: "API product",
};

impl ResourceKind {
    pub fn spec(self) -> &'static ResourceSpec {
        match self {
            ResourceKind::TargetServer => &TARGET_SERVER,
            ResourceKind::SharedFlow => &SHARED_FLOW,
            ResourceKind::Proxy => &PROXY,
            ResourceKind::ApiProduct => &API_PRODUCT,
        }
    }

    /// Plural name used in banners ("Target Servers", "Proxies", ...).
    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::TargetServer => "Target Servers",
            ResourceKind::SharedFlow => "SharedFlows",
            ResourceKind::Proxy => "Proxies",
            ResourceKind::ApiProduct => "API Products",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().label)
    }
}

impl ResourceSpec {
    pub fn extension(&self) -> &'static str {
        match self.payload {
            Payload::Definition => "json",
            Payload::Bundle => "zip",
        }
    }

    /// File name of the staged snapshot of `name`.
    pub fn staged_file_name(&self, name: &str, revision: Option<u64>) -> String {
        match (self.payload, revision) {
            (Payload::Bundle, Some(rev)) => format!("{name}_rev{rev}.zip"),
            _ => format!("{name}.{}", self.extension()),
        }
    }

    /// Recover the resource name from a staged file name, or `None` when the
    /// file does not belong to this resource type.
    pub fn resource_name_from_file<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let stem = file_name.strip_suffix(&format!(".{}", self.extension()))?;
        let name = match self.payload {
            Payload::Definition => stem,
            Payload::Bundle => strip_revision_suffix(stem),
        };
        (!name.is_empty()).then_some(name)
    }
}

fn strip_revision_suffix(stem: &str) -> &str {
    match stem.rsplit_once("_rev") {
        Some((name, rev)) if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => stem,
    }
}

/// Pick the newest revision from the list the management API returns.
///
/// Revisions come back as strings and must be compared numerically:
/// `["9", "10"]` yields `10`. Returns `None` for an empty list or when an
/// entry is not a number.
pub fn latest_revision<S: AsRef<str>>(revisions: &[S]) -> Option<u64> {
    revisions
        .iter()
        .map(|r| r.as_ref().trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?
        .into_iter()
        .max()
}
