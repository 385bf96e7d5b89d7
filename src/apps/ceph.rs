//! `CephMon`'s extra pre-/post-upgrade steps: keeping the cluster-wide
//! `require-osd-release` flag in lock-step with the Ceph upgrade.

use crate::apps::Application;
use crate::catalog::{Catalog, OpenStackRelease};
use crate::errors::CouError;
use crate::steps::{Step, StepCategory, StepOp};

/// What: Pre-upgrade step asserting `require-osd-release` already matches
/// the *current* Ceph release: `require-osd-release` must already equal
/// the current Ceph release before the upgrade proceeds.
///
/// # Errors
/// Propagates `openstack_to_ceph_release`'s error for an unmapped
/// codename.
pub fn ensure_require_osd_release_current(app: &Application, catalog: &Catalog) -> Result<Step, CouError> {
    let current = app.current_os_release(catalog)?;
    let ceph_release = catalog.charms.openstack_to_ceph_release(current)?.to_string();
    Ok(require_osd_release_step(app, &ceph_release, StepCategory::PreUpgrade))
}

/// What: Post-upgrade step advancing `require-osd-release` to the
/// *target* Ceph release.
///
/// # Errors
/// Propagates `openstack_to_ceph_release`'s error for an unmapped
/// codename.
pub fn ensure_require_osd_release_target(
    app: &Application,
    target: OpenStackRelease,
    catalog: &Catalog,
) -> Result<Step, CouError> {
    let ceph_release = catalog.charms.openstack_to_ceph_release(target)?.to_string();
    Ok(require_osd_release_step(app, &ceph_release, StepCategory::PostUpgrade))
}

fn require_osd_release_step(app: &Application, ceph_release: &str, category: StepCategory) -> Step {
    let core = app.core();
    let units = core.unit_names();
    let release = ceph_release.to_string();
    let op: StepOp = Box::new(move |controller| {
        let units = units.clone();
        let release = release.clone();
        Box::pin(async move {
            let Some(unit) = units.first() else {
                return Ok(());
            };
            let versions = controller.run_on_unit(unit, "ceph versions --format json", 120).await?;
            let osd_release = single_osd_release(&versions.stdout)?;
            if osd_release != release {
                tracing::warn!(
                    "ceph-mon unit '{unit}' reports OSDs on '{osd_release}', expected '{release}'; proceeding to set require-osd-release anyway"
                );
            }

            let dump = controller.run_on_unit(unit, "ceph osd dump --format json", 120).await?;
            if current_require_osd_release(&dump.stdout).as_deref() == Some(release.as_str()) {
                return Ok(());
            }

            controller
                .run_on_unit(unit, &format!("ceph osd require-osd-release {release} --yes-i-really-mean-it"), 120)
                .await?;
            Ok(())
        })
    });
    Step::leaf(
        format!("Ensure require-osd-release on ceph-mon units correctly set to '{ceph_release}'"),
        category,
        op,
    )
}

/// What: Parse `ceph versions --format json`'s `osd` section and return
/// the single release name every OSD agrees on.
///
/// # Errors
/// Returns `Err(CouError::RunUpgradeError)` when the OSD section is
/// missing/unparseable, or when more than one release name appears
/// mismatched OSD versions across the cluster abort the step.
fn single_osd_release(stdout: &str) -> Result<String, CouError> {
    let parsed: serde_json::Value =
        serde_json::from_str(stdout).map_err(|e| CouError::RunUpgradeError(format!("could not parse `ceph versions` output: {e}")))?;
    let osd = parsed
        .get("osd")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| CouError::RunUpgradeError("`ceph versions` output has no 'osd' section".to_string()))?;

    let releases: std::collections::HashSet<String> = osd.keys().filter_map(|version_string| release_name(version_string)).collect();

    match releases.len() {
        1 => Ok(releases.into_iter().next().unwrap_or_default()),
        0 => Err(CouError::RunUpgradeError("could not determine a Ceph release from `ceph versions` output".to_string())),
        _ => {
            let mut sorted: Vec<String> = releases.into_iter().collect();
            sorted.sort();
            Err(CouError::RunUpgradeError(format!(
                "OSDs report mismatched Ceph releases ({}); supported releases: octopus, pacific, quincy",
                sorted.join(", ")
            )))
        }
    }
}

/// Extracts the release name from a `ceph versions` key, e.g. `"ceph
/// version 15.2.13 (...) octopus (stable)"` -> `"octopus"`.
fn release_name(version_string: &str) -> Option<String> {
    let words: Vec<&str> = version_string.split_whitespace().collect();
    let stable_idx = words.iter().position(|w| *w == "(stable)")?;
    stable_idx.checked_sub(1).and_then(|idx| words.get(idx)).map(|s| (*s).to_string())
}

/// What: The current `require_osd_release` flag from `ceph osd dump
/// --format json` output, if parseable.
fn current_require_osd_release(stdout: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(stdout).ok()?;
    parsed.get("require_osd_release").and_then(serde_json::Value::as_str).map(ToString::to_string)
}

#[cfg(test)]
mod release_parsing_tests {
    use super::{current_require_osd_release, single_osd_release};

    #[test]
    fn single_osd_release_accepts_unanimous_versions() {
        let stdout = r#"{"osd": {"ceph version 15.2.13 (c1a23c) octopus (stable)": 3}}"#;
        assert_eq!(single_osd_release(stdout).unwrap(), "octopus");
    }

    #[test]
    fn single_osd_release_rejects_mismatched_versions() {
        let stdout =
            r#"{"osd": {"ceph version 15.2.13 (c1a23c) octopus (stable)": 2, "ceph version 16.2.7 (abc123) pacific (stable)": 1}}"#;
        let err = single_osd_release(stdout).unwrap_err();
        assert!(matches!(err, crate::errors::CouError::RunUpgradeError(msg) if msg.contains("mismatched Ceph releases")));
    }

    #[test]
    fn current_require_osd_release_reads_the_flag() {
        let stdout = r#"{"require_osd_release": "octopus"}"#;
        assert_eq!(current_require_osd_release(stdout), Some("octopus".to_string()));
    }
}
