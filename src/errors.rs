//! Error taxonomy shared across the planner and executor.
//!
//! Mirrors the shape of [`crate::controller::ControllerError`]: a single
//! hand-written enum with `Display`/`Error`/`From` impls rather than a
//! `thiserror` derive, following the idiom already used for command
//! execution failures in this codebase.

use std::fmt;

/// What: Every error the core planner/executor can produce.
///
/// Inputs: Constructed by catalog lookups, application classification,
/// plan assembly, and step execution.
///
/// Output: Implements `Display`/`Error` for ergonomic propagation up to the
/// CLI, which prints `Error: {err}` and exits with the appropriate code.
///
/// Details:
/// - `HaltUpgradePlanGeneration` and `HaltUpgradeExecution` are not runtime
///   failures; see the call-site documentation in `apps` and `plan` for the
///   policy on where each is caught.
#[derive(Debug)]
pub enum CouError {
    /// A codename string does not match any known OpenStack release.
    UnknownRelease(String),
    /// A charm is not present in the release catalog's known set.
    UnknownCharm(String),
    /// A workload version has no matching codename for the given charm.
    UnknownVersion {
        /// Charm whose version table was consulted.
        charm: String,
        /// Raw version string that failed to resolve.
        version: String,
    },
    /// A channel string does not parse to a valid track for the charm/series.
    InvalidChannel {
        /// Application name.
        app: String,
        /// Offending channel string.
        channel: String,
    },
    /// An invariant was violated by a specific application.
    ApplicationError {
        /// Application name.
        app: String,
        /// Human-readable description of the violation.
        reason: String,
        /// Optional remediation URL to show the operator.
        remediation: Option<String>,
    },
    /// Units of one application report more than one current OpenStack release.
    MismatchedOpenStackVersions {
        /// Application name.
        app: String,
        /// Codenames observed across the unit set.
        releases: Vec<String>,
    },
    /// Soft signal: nothing to do for this application. Only ever raised
    /// from `Application::generate_upgrade_plan` and only ever caught by
    /// `PlanAssembler::generate_plan`.
    HaltUpgradePlanGeneration {
        /// Application name.
        app: String,
    },
    /// A single unit refuses to upgrade right now (non-empty hypervisor
    /// without `--force`). Fails that unit's subtree only.
    HaltUpgradeExecution {
        /// Unit name.
        unit: String,
        /// Human-readable reason.
        reason: String,
    },
    /// Planning-time failure: no minimum release could be determined.
    NoTargetError,
    /// Planning-time failure: the computed target is outside the supported
    /// range for the cloud's Ubuntu series.
    OutOfSupportRange {
        /// Release that fell outside the supported range.
        release: String,
        /// Ubuntu series the cloud is running.
        series: String,
    },
    /// Planning-time failure: the cloud is already at the highest release
    /// its series supports.
    HighestReleaseAchieved {
        /// The release already achieved.
        release: String,
    },
    /// A wait or action invocation exceeded its deadline.
    TimeoutException {
        /// What was being waited for.
        what: String,
        /// Deadline, in seconds, that was exceeded.
        seconds: u64,
    },
    /// Vault is sealed; the operator must unseal it manually before upgrading.
    VaultSealed,
    /// An action invocation completed but reported failure.
    ActionFailed {
        /// Unit the action ran against.
        unit: String,
        /// Action name.
        action: String,
        /// Stderr/diagnostic output, if any.
        message: String,
    },
    /// Running a raw command on a unit failed.
    CommandRunFailed {
        /// Unit the command ran against.
        unit: String,
        /// Command string.
        command: String,
        /// Exit code, if known.
        code: Option<i32>,
    },
    /// A controller-layer upgrade invocation failed in a way specific to
    /// the charm operation being performed (e.g. ceph release mismatch).
    RunUpgradeError(String),
    /// A named unit does not exist in the model.
    UnitNotFound(String),
    /// A named application does not exist in the model.
    ApplicationNotFound(String),
    /// Wraps an underlying I/O error (log files, CSV assets, backup SCP).
    Io(std::io::Error),
}

impl fmt::Display for CouError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRelease(s) => write!(f, "unknown OpenStack release {s:?}"),
            Self::UnknownCharm(s) => write!(f, "unknown charm {s:?}"),
            Self::UnknownVersion { charm, version } => {
                write!(f, "{charm}: no codename matches workload version {version:?}")
            }
            Self::InvalidChannel { app, channel } => {
                write!(f, "{app}: channel {channel:?} does not parse to a valid track")
            }
            Self::ApplicationError { app, reason, remediation } => {
                write!(f, "{app}: {reason}")?;
                if let Some(url) = remediation {
                    write!(f, " (see {url})")?;
                }
                Ok(())
            }
            Self::MismatchedOpenStackVersions { app, releases } => {
                write!(
                    f,
                    "{app}: units report mismatched OpenStack releases ({}); supply an explicit unit list",
                    releases.join(", ")
                )
            }
            Self::HaltUpgradePlanGeneration { app } => {
                write!(f, "{app}: nothing to do, halting plan generation")
            }
            Self::HaltUpgradeExecution { unit, reason } => {
                write!(f, "{unit}: refusing to upgrade now: {reason}")
            }
            Self::NoTargetError => write!(f, "could not determine an upgrade target"),
            Self::OutOfSupportRange { release, series } => {
                write!(f, "{release} is out of the supported range for series {series}")
            }
            Self::HighestReleaseAchieved { release } => {
                write!(f, "cloud is already at the highest supported release ({release})")
            }
            Self::TimeoutException { what, seconds } => {
                write!(f, "timed out after {seconds}s waiting for {what}")
            }
            Self::VaultSealed => write!(
                f,
                "vault is sealed; see https://charmhub.io/vault to unseal it manually before upgrading"
            ),
            Self::ActionFailed { unit, action, message } => {
                write!(f, "action {action} on {unit} failed: {message}")
            }
            Self::CommandRunFailed { unit, command, code } => {
                write!(f, "command {command:?} on {unit} failed (exit {code:?})")
            }
            Self::RunUpgradeError(s) => write!(f, "{s}"),
            Self::UnitNotFound(s) => write!(f, "unit {s:?} not found"),
            Self::ApplicationNotFound(s) => write!(f, "application {s:?} not found"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for CouError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CouError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl CouError {
    /// What: Whether this error is a planning-time halt rather than a true
    /// failure, per the §7 propagation policy.
    #[must_use]
    pub const fn is_halt_plan_generation(&self) -> bool {
        matches!(self, Self::HaltUpgradePlanGeneration { .. })
    }
}
