//! Pre-upgrade database backup, treated as an external collaborator
//! subsystem — consumed here through a narrow [`BackupClient`] trait
//! rather than reimplemented in full.
//!
//! Locates the `mysql-innodb-cluster` application related to `keystone`
//! via a `db-router` relation, runs `mysqldump` on one of its units,
//! loosens then restores the dump directory's permissions, and `scp`s the
//! result to the operator's local `COU_DATA` directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::controller::ControllerClient;
use crate::errors::CouError;

/// Narrow interface the backup step needs from the controller, kept
/// separate from [`ControllerClient`] so a test double can mock backups
/// independently of the rest of the cluster interaction surface.
#[async_trait]
pub trait BackupClient: Send + Sync {
    /// What: Run `mysqldump` on `unit`, writing the dump under
    /// `remote_dir` on that unit.
    ///
    /// # Errors
    /// Propagates the underlying action/command failure.
    async fn dump_databases(&self, unit: &str, remote_dir: &str) -> Result<String, CouError>;

    /// What: Adjust `path`'s permissions on `unit` by running `chmod
    /// <mode> <path>`.
    ///
    /// # Errors
    /// Propagates the underlying command failure.
    async fn chmod(&self, unit: &str, path: &str, mode: &str) -> Result<(), CouError>;

    /// What: Copy `remote_path` off `unit` into `local_path`.
    ///
    /// # Errors
    /// Propagates the underlying transfer failure.
    async fn fetch(&self, unit: &str, remote_path: &str, local_path: &Path) -> Result<(), CouError>;
}

/// [`BackupClient`] implemented directly in terms of a [`ControllerClient`]
/// — the production path, since every primitive it needs (`run_action`,
/// `run_on_unit`, `scp_from_unit`) is already part of that trait.
pub struct ControllerBackupClient<'a> {
    controller: &'a dyn ControllerClient,
}

impl<'a> ControllerBackupClient<'a> {
    /// What: Wrap a controller handle for backup use.
    #[must_use]
    pub const fn new(controller: &'a dyn ControllerClient) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl BackupClient for ControllerBackupClient<'_> {
    async fn dump_databases(&self, unit: &str, remote_dir: &str) -> Result<String, CouError> {
        let mut params = std::collections::HashMap::new();
        params.insert("directory".to_string(), remote_dir.to_string());
        let result = self.controller.run_action(unit, "mysqldump", params).await?;
        result
            .output
            .get("basedir")
            .cloned()
            .ok_or_else(|| CouError::RunUpgradeError(format!("mysqldump on '{unit}' did not report a basedir")))
    }

    async fn chmod(&self, unit: &str, path: &str, mode: &str) -> Result<(), CouError> {
        self.controller.run_on_unit(unit, &format!("chmod {mode} {path}"), 60).await?;
        Ok(())
    }

    async fn fetch(&self, unit: &str, remote_path: &str, local_path: &Path) -> Result<(), CouError> {
        self.controller.scp_from_unit(unit, remote_path, local_path).await
    }
}

/// What: Locate the `mysql-innodb-cluster` application related to
/// `keystone` via a `db-router` relation, among the applications known to
/// this analysis.
///
/// Input: `apps`, every classified application's name/charm/relations as
/// reported by the controller status.
///
/// Output: The application name to back up, or `None` when no
/// `mysql-innodb-cluster` application relates to a `keystone`-named
/// application (nothing to back up — the caller skips the step, it does
/// not fail).
#[must_use]
pub fn find_database_application<'a>(
    apps: impl IntoIterator<Item = (&'a str, &'a str, &'a [String])>,
) -> Option<&'a str> {
    let mut mysql_candidates = Vec::new();
    let mut keystone_related = false;
    for (name, charm, relations) in apps {
        if charm == "mysql-innodb-cluster" {
            mysql_candidates.push(name);
        }
        if charm == "keystone" {
            keystone_related = keystone_related || relations.iter().any(|r| r.contains("db-router"));
        }
    }
    if keystone_related { mysql_candidates.into_iter().next() } else { None }
}

/// What: Run the full backup sequence against `app_unit`: dump, loosen
/// permissions, fetch locally, restore permissions.
///
/// Input: `app_unit`, the unit to dump from; `local_dir`, the operator's
/// `COU_DATA` directory the dump lands in.
///
/// Output: The local path the dump was written to.
///
/// # Errors
/// Propagates any [`BackupClient`] failure; permissions are best-effort
/// restored (a failure to `chmod` back is logged, not propagated, so a
/// backup that already produced dump data is not thrown away over a
/// cosmetic permission revert).
pub async fn backup_databases(client: &dyn BackupClient, app_unit: &str, local_dir: &Path) -> Result<PathBuf, CouError> {
    std::fs::create_dir_all(local_dir)?;
    let remote_dir = "/var/backups/mysql-innodb-cluster";
    let basedir = client.dump_databases(app_unit, remote_dir).await?;
    client.chmod(app_unit, &basedir, "o+rx").await?;

    let local_path = local_dir.join(format!("{}-mysqldump.tar.gz", app_unit.replace('/', "-")));
    let fetch_result = client.fetch(app_unit, &format!("{basedir}/mysqldump.tar.gz"), &local_path).await;

    if let Err(err) = client.chmod(app_unit, &basedir, "o-rx").await {
        tracing::warn!("failed to restore permissions on '{basedir}' on unit '{app_unit}': {err}");
    }

    fetch_result?;
    Ok(local_path)
}
