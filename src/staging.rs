// Local staging area between the export and import phases.
//
// Layout: `<parent>/fromOrgResources/<ResourceType>/<file>`. The guard only
// ever works inside its own `fromOrgResources` subdirectory and only removes
// what it created there, so a failed run cleans up just like a successful
// one without touching anything else under `<parent>`.

use crate::resource::ResourceSpec;
use anyhow::{bail, Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const STAGING_DIR_NAME: &str = "fromOrgResources";

/// Default parent of the staging area: `~/.apigee-migrate`.
pub fn default_root() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(".apigee-migrate")
}

/// Owns the staging directory for the duration of a run.
pub struct StagingDir {
    root: PathBuf,
    // false when an empty `fromOrgResources` was already there; the guard
    // then empties it on drop but leaves the directory itself
    created: bool,
    keep: bool,
}

impl StagingDir {
    /// Claim `<parent>/fromOrgResources`, creating it if needed.
    ///
    /// Refuses to start when that directory already holds files, since they
    /// would be imported as if this run had exported them.
    pub fn create(parent: impl AsRef<Path>) -> Result<Self> {
        let root = parent.as_ref().join(STAGING_DIR_NAME);
        let created = match std::fs::read_dir(&root) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    bail!(
                        "Staging directory {} is not empty; remove it or pick another --staging-dir",
                        root.display()
                    );
                }
                false
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                std::fs::create_dir_all(&root).with_context(|| {
                    format!("Failed to create staging directory {}", root.display())
                })?;
                true
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read staging directory {}", root.display())
                })
            }
        };
        debug!(path = %root.display(), created, "staging directory ready");
        Ok(StagingDir {
            root,
            created,
            keep: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Do not delete the staged files when the guard is dropped.
    pub fn keep(mut self) -> Self {
        self.keep = true;
        self
    }

    /// Directory for one resource type, created on demand.
    pub fn type_dir(&self, spec: &ResourceSpec) -> Result<PathBuf> {
        let dir = self.root.join(spec.staging_dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }

    /// Staged files of one resource type as `(resource name, path)`, sorted
    /// by file name. A type that was never exported has no files.
    pub fn staged_files(&self, spec: &ResourceSpec) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.root.join(spec.staging_dir);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read staging directory {}", dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = spec.resource_name_from_file(file_name) {
                files.push((name.to_string(), entry.path()));
            }
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }

    fn clean_up(&self) -> io::Result<()> {
        if self.created {
            return std::fs::remove_dir_all(&self.root);
        }
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            } else {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.keep || !self.root.exists() {
            return;
        }
        match self.clean_up() {
            Ok(()) => debug!(path = %self.root.display(), "staging directory removed"),
            Err(e) => warn!(path = %self.root.display(), "Failed to remove staging directory: {e}"),
        }
    }
}
