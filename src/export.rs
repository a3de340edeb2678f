// Export phase: copy every resource of one type from the source
// organization into the staging directory.
//
// Listing failures are returned to the caller; a failure on one item is
// logged and the loop moves on to the next.

use crate::api::{ApiClient, Credential, Transport};
use crate::config::OrganizationConfig;
use crate::resource::{latest_revision, Payload, ResourceKind, ResourceSpec};
use crate::staging::StagingDir;
use crate::ui;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{error, info};

/// Names that made it through a batch and names that did not.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl BatchOutcome {
    pub(crate) fn record(&mut self, name: &str, ok: bool) {
        if ok {
            self.succeeded.push(name.to_string());
        } else {
            self.failed.push(name.to_string());
        }
    }
}

/// Exports all resources of one type from `source`.
pub struct Exporter<'a, T: Transport> {
    api: &'a ApiClient<T>,
    staging: &'a StagingDir,
    source: &'a OrganizationConfig,
    credential: &'a Credential,
}

impl<'a, T: Transport> Exporter<'a, T> {
    pub fn new(
        api: &'a ApiClient<T>,
        staging: &'a StagingDir,
        source: &'a OrganizationConfig,
        credential: &'a Credential,
    ) -> Self {
        Exporter {
            api,
            staging,
            source,
            credential,
        }
    }

    pub fn export_all(&self, kind: ResourceKind) -> Result<BatchOutcome> {
        let spec = kind.spec();
        let names = self
            .api
            .list_names(spec, &self.source.org_name, &self.source.environment, self.credential)
            .with_context(|| {
                format!(
                    "Failed to list {} in {}",
                    kind.plural(),
                    self.source.org_name
                )
            })?;

        let mut outcome = BatchOutcome::default();
        if names.is_empty() {
            info!("No {} found to migrate.", kind.plural());
            return Ok(outcome);
        }

        let dir = self.staging.type_dir(spec)?;
        let bar = ui::batch_bar(names.len(), kind.plural());
        for name in &names {
            let result = match spec.payload {
                Payload::Definition => self.export_definition(spec, name, &dir),
                Payload::Bundle => self.export_bundle(spec, name, &dir),
            };
            if let Err(e) = &result {
                ui::suspend(|| error!("Skipping {kind} {name} due to error: {e:#}"));
            }
            outcome.record(name, result.is_ok());
            bar.inc(1);
        }
        ui::finish(&bar);

        info!(
            "{} export finished: {} downloaded, {} skipped",
            kind.plural(),
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    fn export_definition(&self, spec: &ResourceSpec, name: &str, dir: &Path) -> Result<()> {
        let definition = self.api.get_definition(
            spec,
            &self.source.org_name,
            &self.source.environment,
            name,
            self.credential,
        )?;
        let path = dir.join(spec.staged_file_name(name, None));
        let pretty = serde_json::to_string_pretty(&definition)?;
        std::fs::write(&path, pretty)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        ui::suspend(|| {
            info!("Downloaded details for {} {name} to {}", spec.label, path.display())
        });
        Ok(())
    }

    fn export_bundle(&self, spec: &ResourceSpec, name: &str, dir: &Path) -> Result<()> {
        let revisions =
            self.api
                .list_revisions(spec, &self.source.org_name, name, self.credential)?;
        let revision = latest_revision(revisions.as_slice())
            .ok_or_else(|| anyhow!("no usable revision in {revisions:?}"))?;

        let path = dir.join(spec.staged_file_name(name, Some(revision)));
        let written = self.download_to(spec, name, revision, &path);
        if written.is_err() {
            // never leave a truncated bundle behind for the importer
            let _ = std::fs::remove_file(&path);
        }
        let bytes = written?;
        ui::suspend(|| {
            info!(
                "Downloaded {} {name} revision {revision} to {} ({bytes} bytes)",
                spec.label,
                path.display()
            )
        });
        Ok(())
    }

    fn download_to(
        &self,
        spec: &ResourceSpec,
        name: &str,
        revision: u64,
        path: &Path,
    ) -> Result<u64> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut sink = BufWriter::new(file);
        let bytes = self.api.download_bundle(
            spec,
            &self.source.org_name,
            name,
            revision,
            self.credential,
            &mut sink,
        )?;
        sink.into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::test_support::{fake_client, FakeTransport, BASE};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn source() -> OrganizationConfig {
        OrganizationConfig {
            org_name: "src".into(),
            environment: "test".into(),
        }
    }

    #[test]
    fn exports_latest_numeric_revision_of_each_proxy() {
        let fake = FakeTransport::new()
            .respond_json(
                &format!("{BASE}/organizations/src/apis"),
                json!({"proxies": [{"name": "orders"}, {"name": "users"}]}),
            )
            .respond_json(
                &format!("{BASE}/organizations/src/apis/orders/revisions"),
                json!(["9", "10"]),
            )
            .respond_json(
                &format!("{BASE}/organizations/src/apis/users/revisions"),
                json!(["1", "3", "2"]),
            )
            .respond_bytes(
                &format!("{BASE}/organizations/src/apis/orders/revisions/10?format=bundle"),
                b"PK-orders".to_vec(),
            )
            .respond_bytes(
                &format!("{BASE}/organizations/src/apis/users/revisions/3?format=bundle"),
                b"PK-users".to_vec(),
            );
        let api = fake_client(fake);
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingDir::create(tmp.path().join("stage")).unwrap();
        let src = source();
        let cred = Credential::new("from-token");

        let outcome = Exporter::new(&api, &staging, &src, &cred)
            .export_all(ResourceKind::Proxy)
            .unwrap();

        assert_eq!(outcome.succeeded, vec!["orders", "users"]);
        let dir = staging.root().join("proxies");
        assert_eq!(std::fs::read(dir.join("orders_rev10.zip")).unwrap(), b"PK-orders");
        assert_eq!(std::fs::read(dir.join("users_rev3.zip")).unwrap(), b"PK-users");
        assert!(api
            .transport()
            .calls()
            .iter()
            .all(|c| c.token == "Bearer from-token"));
    }

    #[test]
    fn failed_item_is_skipped_and_leaves_no_file() {
        let fake = FakeTransport::new()
            .respond_json(
                &format!("{BASE}/organizations/src/sharedflows"),
                json!({"sharedFlows": [{"name": "broken"}, {"name": "ok"}]}),
            )
            .respond_json(
                &format!("{BASE}/organizations/src/sharedflows/broken/revisions"),
                json!(["1"]),
            )
            .fail(
                &format!("{BASE}/organizations/src/sharedflows/broken/revisions/1?format=bundle"),
                ApiError::NoResponse {
                    message: "reset".into(),
                },
            )
            .respond_json(
                &format!("{BASE}/organizations/src/sharedflows/ok/revisions"),
                json!(["2"]),
            )
            .respond_bytes(
                &format!("{BASE}/organizations/src/sharedflows/ok/revisions/2?format=bundle"),
                b"PK".to_vec(),
            );
        let api = fake_client(fake);
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingDir::create(tmp.path().join("stage")).unwrap();
        let src = source();
        let cred = Credential::new("t");

        let outcome = Exporter::new(&api, &staging, &src, &cred)
            .export_all(ResourceKind::SharedFlow)
            .unwrap();

        assert_eq!(outcome.succeeded, vec!["ok"]);
        assert_eq!(outcome.failed, vec!["broken"]);
        let dir = staging.root().join("sharedflows");
        assert!(!dir.join("broken_rev1.zip").exists());
        assert!(dir.join("ok_rev2.zip").exists());
    }

    #[test]
    fn writes_target_server_definitions_as_json() {
        let body = json!({"name": "backend", "host": "10.0.0.1", "port": 443, "isEnabled": true});
        let fake = FakeTransport::new()
            .respond_json(
                &format!("{BASE}/organizations/src/environments/test/targetservers"),
                json!(["backend"]),
            )
            .respond_json(
                &format!("{BASE}/organizations/src/environments/test/targetservers/backend"),
                body.clone(),
            );
        let api = fake_client(fake);
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingDir::create(tmp.path().join("stage")).unwrap();
        let src = source();
        let cred = Credential::new("t");

        Exporter::new(&api, &staging, &src, &cred)
            .export_all(ResourceKind::TargetServer)
            .unwrap();

        let written = std::fs::read_to_string(staging.root().join("TargetServer/backend.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, body);
    }

    #[test]
    fn listing_failure_is_an_error() {
        let fake = FakeTransport::new().fail(
            &format!("{BASE}/organizations/src/apiproducts"),
            ApiError::Status {
                status: 403,
                body: "denied".into(),
            },
        );
        let api = fake_client(fake);
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingDir::create(tmp.path().join("stage")).unwrap();
        let src = source();
        let cred = Credential::new("t");

        let err = Exporter::new(&api, &staging, &src, &cred)
            .export_all(ResourceKind::ApiProduct)
            .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to list API Products in src"));
    }

    #[test]
    fn revisions_that_are_not_numbers_skip_the_item() {
        let fake = FakeTransport::new()
            .respond_json(
                &format!("{BASE}/organizations/src/apis"),
                json!({"proxies": [{"name": "odd"}]}),
            )
            .respond_json(
                &format!("{BASE}/organizations/src/apis/odd/revisions"),
                json!([]),
            );
        let api = fake_client(fake);
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingDir::create(tmp.path().join("stage")).unwrap();
        let src = source();
        let cred = Credential::new("t");

        let outcome = Exporter::new(&api, &staging, &src, &cred)
            .export_all(ResourceKind::Proxy)
            .unwrap();
        assert_eq!(outcome.failed, vec!["odd"]);
        assert!(api.transport().urls_containing("format=bundle").is_empty());
    }
}
