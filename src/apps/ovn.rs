//! The OVN minimum-version gate shared by `OvnPrincipal`/`OvnSubordinate`.

use crate::apps::Application;
use crate::catalog::table::parse_version;
use crate::errors::CouError;

const MINIMUM_OVN_VERSION: (u32, u32, u32) = (22, 3, 0);
const REMEDIATION_URL: &str = "https://docs.openstack.org/charm-guide/latest/admin/upgrades/minor-openstack-upgrade.html";

/// What: Assert every unit's workload version is at least `22.03.0`.
///
/// # Errors
/// Returns `Err(CouError::ApplicationError)` naming the offending unit and
/// carrying the upgrade-guide remediation URL when any unit is older.
pub fn assert_minimum_version(app: &Application) -> Result<(), CouError> {
    let core = app.core();
    for unit in core.unit_names() {
        let version = &core.units[&unit].workload_version;
        if parse_version(version) < MINIMUM_OVN_VERSION {
            return Err(CouError::ApplicationError {
                app: core.name.clone(),
                reason: format!(
                    "unit '{unit}' reports OVN version '{version}': OVN versions lower than 22.03 are not supported"
                ),
                remediation: Some(REMEDIATION_URL.to_string()),
            });
        }
    }
    Ok(())
}
