//! # cou Crate Overview
//!
//! `cou` bundles the release catalog, step tree, application model, planner,
//! and executor that power the `cou` command-line upgrader. Integration
//! tests and downstream tooling can depend on this crate to drive a plan
//! or run without going through the binary entrypoint.
//!
//! ## Highlights
//! - A totally-ordered release catalog (`catalog`) loaded once from embedded
//!   data assets and threaded through the rest of the program.
//! - A generic, cancellable step tree (`steps`) used for both the
//!   assembled plan and its execution state.
//! - Per-application upgrade planning (`apps`) dispatched over a closed set
//!   of charm classes.
//! - Cloud inspection and target-release derivation (`analyze`), plan
//!   assembly (`plan`), and a prompting, cancellable executor (`execute`).
//! - A controller abstraction (`controller`) isolating every Juju
//!   interaction behind a trait, for deterministic testing.
//!
//! ## Crate Layout
//! - [`catalog`]: release ordering, workload-version tables, charm
//!   classification.
//! - [`steps`]: the generic `Step` tree primitive.
//! - [`apps`]: the `Application` model and its per-variant step factories.
//! - [`hypervisor`]: groups `nova-compute` units into the data-plane
//!   availability-zone/machine tree.
//! - [`analyze`], [`plan`], [`execute`]: cloud inspection, plan assembly,
//!   and execution.
//! - [`controller`]: the `ControllerClient` trait and its test double.
//! - [`backup`]: the pre-upgrade database backup helper.
//! - [`config`], [`logging`]: ambient configuration and structured logging.
//! - [`cli`]: argument parsing and subcommand dispatch for the binary.
//!
//! ## Quick Start
//! ```no_run
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = std::sync::Arc::new(cou::catalog::Catalog::load_default()?);
//!     println!("newest known release: {}", cou::catalog::OpenStackRelease::newest());
//!     let _ = catalog;
//!     Ok(())
//! }
//! ```

pub mod analyze;
pub mod apps;
pub mod backup;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod controller;
pub mod errors;
pub mod execute;
pub mod hypervisor;
pub mod logging;
pub mod plan;
pub mod steps;

pub use errors::CouError;

#[cfg(test)]
static GLOBAL_TEST_MUTEX: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();

#[cfg(test)]
/// What: Provide a global mutex to serialize all tests that mutate
/// `JUJU_MODEL`, `MODEL_NAME`, `COU_DATA`, or other global environment
/// variables.
///
/// Input: None.
/// Output: `&'static Mutex<()>` guard to synchronize tests touching global
/// environment state.
///
/// Details:
/// - Lazily initializes a global `Mutex` via `OnceLock` for cross-test
///   coordination.
/// - Handles poisoned mutexes gracefully by recovering from panics in
///   previous tests.
pub fn global_test_mutex() -> &'static std::sync::Mutex<()> {
    GLOBAL_TEST_MUTEX.get_or_init(|| std::sync::Mutex::new(()))
}

#[cfg(test)]
/// What: Lock the global test mutex, handling poisoned mutexes gracefully.
///
/// Input: None.
/// Output: `MutexGuard<()>` that will be released when dropped.
pub fn global_test_mutex_lock() -> std::sync::MutexGuard<'static, ()> {
    global_test_mutex().lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
