// Import phase: create every staged resource of one type in the destination
// organization, deploying bundles unless running in import-only mode.

use crate::api::{ApiClient, Credential, Transport};
use crate::config::OrganizationConfig;
use crate::error::ApiError;
use crate::export::BatchOutcome;
use crate::resource::{latest_revision, Payload, ResourceKind, ResourceSpec};
use crate::staging::StagingDir;
use crate::ui;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{error, info, warn};

/// Imports staged resources of one type into `destination`.
pub struct Importer<'a, T: Transport> {
    api: &'a ApiClient<T>,
    staging: &'a StagingDir,
    destination: &'a OrganizationConfig,
    credential: &'a Credential,
    import_only: bool,
}

impl<'a, T: Transport> Importer<'a, T> {
    pub fn new(
        api: &'a ApiClient<T>,
        staging: &'a StagingDir,
        destination: &'a OrganizationConfig,
        credential: &'a Credential,
        import_only: bool,
    ) -> Self {
        Importer {
            api,
            staging,
            destination,
            credential,
            import_only,
        }
    }

    pub fn import_all(&self, kind: ResourceKind) -> Result<BatchOutcome> {
        let spec = kind.spec();
        let files = self.staging.staged_files(spec)?;
        let mut outcome = BatchOutcome::default();
        if files.is_empty() {
            info!("No {} found to create.", kind.plural());
            return Ok(outcome);
        }

        let bar = ui::batch_bar(files.len(), kind.plural());
        for (name, path) in &files {
            let result = match spec.payload {
                Payload::Definition => self.create_definition(spec, name, path),
                Payload::Bundle => self.import_bundle(spec, name, path),
            };
            if let Err(e) = &result {
                ui::suspend(|| error!("Skipping {kind} {name} due to error: {e:#}"));
            }
            outcome.record(name, result.is_ok());
            bar.inc(1);
        }
        ui::finish(&bar);

        info!(
            "{} import finished: {} created, {} skipped",
            kind.plural(),
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    fn create_definition(&self, spec: &ResourceSpec, name: &str, path: &Path) -> Result<()> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let definition: Value = serde_json::from_str(&data)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        self.api
            .create_definition(
                spec,
                &self.destination.org_name,
                &self.destination.environment,
                &definition,
                self.credential,
            )
            .map_err(|e| anyhow!("{}", describe(&e)))?;
        ui::suspend(|| info!("{} '{name}' created successfully.", capitalize(spec.label)));
        Ok(())
    }

    fn import_bundle(&self, spec: &ResourceSpec, name: &str, path: &Path) -> Result<()> {
        let org = &self.destination.org_name;
        self.api
            .import_bundle(spec, org, name, path, self.credential)
            .map_err(|e| anyhow!("upload of {} failed: {}", path.display(), describe(&e)))?;
        ui::suspend(|| info!("Uploaded {} bundle {} successfully.", spec.label, path.display()));

        if self.import_only {
            ui::suspend(|| {
                info!(
                    "Skipping deployment for {} {name} as --onlyimport flag is set.",
                    spec.label
                )
            });
            return Ok(());
        }
        self.deploy_latest(spec, name)
    }

    fn deploy_latest(&self, spec: &ResourceSpec, name: &str) -> Result<()> {
        let org = &self.destination.org_name;
        let env = &self.destination.environment;
        let revisions = self
            .api
            .list_revisions(spec, org, name, self.credential)
            .map_err(|e| anyhow!("fetching revisions failed: {}", describe(&e)))?;
        let revision = latest_revision(revisions.as_slice())
            .ok_or_else(|| anyhow!("no usable revision in {revisions:?}"))?;

        if let Err(e) = self
            .api
            .deploy(spec, org, env, name, revision, self.credential)
        {
            ui::suspend(|| match &e {
                ApiError::Status { status, .. } => error!(
                    "Deploy of {} {name} revision {revision} rejected with status {status}: {}",
                    spec.label,
                    describe(&e)
                ),
                ApiError::NoResponse { message } => error!(
                    "No response deploying {} {name} revision {revision}: {message}",
                    spec.label
                ),
                ApiError::Request { message } | ApiError::Decode { message } => warn!(
                    "Could not send deploy request for {} {name} revision {revision}: {message}",
                    spec.label
                ),
            });
            return Err(anyhow!("deploy failed: {e}"));
        }
        ui::suspend(|| {
            info!(
                "Deployed {} {name} revision {revision} to environment {env}.",
                spec.label
            )
        });
        Ok(())
    }
}

/// Prefer the management API's own message and violations over the raw body.
fn describe(err: &ApiError) -> String {
    match (err, err.violation_details()) {
        (ApiError::Status { status, .. }, Some(details)) => {
            format!("Status: {status}, Message: {details}")
        }
        _ => err.to_string(),
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
