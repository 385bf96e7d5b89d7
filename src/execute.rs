//! Executes an assembled [`Plan`]: walks the tree depth-first, runs leaf
//! operations through the controller, prompts the operator when
//! interactive, and reacts to `SIGINT` with a two-stage cancellation
//! runtime.
//!
//! `Step::run` only ever touches its own node's operation — this module is
//! the one that recurses into `children`, honoring `parallel` and
//! `dependent`, and aggregating a parallel parent's worst child state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::prompt::{self, Choice};
use crate::controller::ControllerClient;
use crate::errors::CouError;
use crate::steps::{Plan, Step, StepState};

/// What the run as a whole resolved to, mapped straight to a process exit
/// code at the CLI boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Every step ran, was skipped by choice, or was a dependent skip —
    /// none of which is a failure.
    Completed,
    /// At least one step failed and the run was not interrupted.
    Failed,
    /// The operator interrupted the run with `SIGINT`.
    Interrupted,
}

/// What: `execute(plan, controller, interactive, allow_parallel)`.
///
/// Input: `allow_parallel` gates whether nodes the plan marked
/// `parallel = true` actually run concurrently; when `false`, every node
/// (regardless of how it was assembled) runs its children strictly in
/// order — the runtime override behind `--parallel`/no flag.
///
/// Details: a `SIGINT` during the run requests a safe cancellation (finish
/// the currently running leaf, skip everything after it); a second
/// `SIGINT` requests an immediate one. Both are implemented by flipping
/// `plan`'s shared cancellation flag and relying on `Step::run`'s own
/// idempotent check — this function never force-aborts an in-flight
/// future.
pub async fn execute(plan: &mut Plan, controller: &dyn ControllerClient, interactive: bool, allow_parallel: bool) -> ExecuteOutcome {
    let cancel_flag = plan.cancel_flag();
    let sigint_count = Arc::new(AtomicBool::new(false));
    let watcher = spawn_sigint_watcher(Arc::clone(&cancel_flag), Arc::clone(&sigint_count));

    let result = run_step(plan, controller, interactive, allow_parallel, &cancel_flag).await;
    watcher.abort();

    if cancel_flag.load(Ordering::SeqCst) {
        return ExecuteOutcome::Interrupted;
    }
    match result {
        Ok(()) if plan.state == StepState::Failed || plan.worst_child_state() == StepState::Failed => ExecuteOutcome::Failed,
        Ok(()) => ExecuteOutcome::Completed,
        Err(_) => ExecuteOutcome::Failed,
    }
}

/// What: Listen for `SIGINT`; the first one requests a safe cancellation
/// (`cancel(true)`-equivalent: just flips the shared flag, letting the
/// running leaf finish), logged once. This task only ever sets the flag —
/// `run_step` is the one that actually marks subtrees `Canceled` once it
/// next observes it, matching "cancellation flags propagate downward
/// lazily at execution time.
fn spawn_sigint_watcher(cancel_flag: Arc<AtomicBool>, already_interrupted: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if already_interrupted.swap(true, Ordering::SeqCst) {
                tracing::warn!("second interrupt received, cancellation already in progress");
            } else {
                tracing::warn!("interrupt received, finishing the current step and stopping");
            }
            cancel_flag.store(true, Ordering::SeqCst);
        }
    })
}

/// What: Recursively execute `step` and its subtree.
///
/// Details: a leaf (no children) runs its own operation via `Step::run`.
/// A container with `parallel && allow_parallel` spawns one task per
/// child and joins them, taking the worst resulting state; otherwise
/// children run strictly in order, and a `dependent` child is skipped
/// (not run) once a prior sibling has failed or been skipped/canceled.
fn run_step<'a>(
    step: &'a mut Step,
    controller: &'a dyn ControllerClient,
    interactive: bool,
    allow_parallel: bool,
    cancel_flag: &'a Arc<AtomicBool>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), CouError>> + Send + 'a>> {
    Box::pin(async move {
        if cancel_flag.load(Ordering::SeqCst) {
            step.skip_subtree();
            step.state = StepState::Canceled;
            return Ok(());
        }

        if interactive && step.has_content() {
            match prompt::ask(step) {
                Choice::Abort => {
                    cancel_flag.store(true, Ordering::SeqCst);
                    step.skip_subtree();
                    step.state = StepState::Canceled;
                    return Ok(());
                }
                Choice::Skip => {
                    step.skip_subtree();
                    return Ok(());
                }
                Choice::Continue => {}
            }
        }

        if step.children.is_empty() {
            return step.run(controller).await;
        }

        if step.parallel && allow_parallel {
            run_children_parallel(step, controller, interactive, allow_parallel, cancel_flag).await
        } else {
            run_children_sequential(step, controller, interactive, allow_parallel, cancel_flag).await
        }
    })
}

async fn run_children_sequential<'a>(
    step: &'a mut Step,
    controller: &'a dyn ControllerClient,
    interactive: bool,
    allow_parallel: bool,
    cancel_flag: &'a Arc<AtomicBool>,
) -> Result<(), CouError> {
    // A `dependent` child is skipped once a prior sibling has failed
    // every other child still runs regardless of a prior
    // failure — this is what lets, e.g., `NovaCompute`'s `enable-scheduler`
    // still run after a `dependent` `pause`/`openstack-upgrade`/`resume`
    // chain was skipped by a failed empty-hypervisor check, and what lets
    // a top-level group's later applications
    // still get a chance after an earlier one fails.
    let mut prior_failed = false;
    let mut first_err = None;
    for child in &mut step.children {
        if prior_failed && child.dependent {
            child.skip_subtree();
            continue;
        }
        match run_step(child, controller, interactive, allow_parallel, cancel_flag).await {
            Ok(()) => {
                if matches!(child.state, StepState::Failed | StepState::Canceled) {
                    prior_failed = true;
                }
            }
            Err(err) => {
                prior_failed = true;
                first_err.get_or_insert(err);
            }
        }
        if cancel_flag.load(Ordering::SeqCst) {
            break;
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// What: Run every child concurrently via `tokio::spawn`, then aggregate
/// the overall status as the worst child state (the group's overall
/// status is the worst of its children's).
async fn run_children_parallel<'a>(
    step: &'a mut Step,
    controller: &'a dyn ControllerClient,
    interactive: bool,
    allow_parallel: bool,
    cancel_flag: &'a Arc<AtomicBool>,
) -> Result<(), CouError> {
    // `tokio::spawn` needs `'static`; children are executed in a scoped
    // local task set instead via `futures::future::join_all`, which keeps
    // their borrow of `controller`/`cancel_flag` and runs them
    // concurrently on the current task without requiring ownership
    // transfer.
    let futures = step.children.iter_mut().map(|child| run_step(child, controller, interactive, allow_parallel, cancel_flag));
    let results = futures::future::join_all(futures).await;
    let first_err = results.into_iter().find_map(Result::err);
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_double::RecordReplayControllerClient;
    use crate::steps::{StepCategory, StepOp};

    fn op_ok() -> StepOp {
        Box::new(|_controller| Box::pin(async { Ok(()) }))
    }

    fn op_err() -> StepOp {
        Box::new(|_controller| Box::pin(async { Err(CouError::RunUpgradeError("boom".into())) }))
    }

    #[tokio::test]
    async fn non_interactive_run_completes_a_simple_sequential_plan() {
        let controller = RecordReplayControllerClient::empty();
        let mut root = Step::new("root", StepCategory::UpgradePlan, false);
        root.add_child(Step::leaf("a", StepCategory::Upgrade, op_ok()));
        root.add_child(Step::leaf("b", StepCategory::Upgrade, op_ok()));
        let outcome = execute(&mut root, &controller, false, true).await;
        assert_eq!(outcome, ExecuteOutcome::Completed);
        assert!(root.children.iter().all(|c| c.state == StepState::Done));
    }

    #[tokio::test]
    async fn a_failed_step_skips_its_dependent_sibling() {
        let controller = RecordReplayControllerClient::empty();
        let mut root = Step::new("root", StepCategory::UpgradePlan, false);
        root.add_child(Step::leaf("a", StepCategory::Upgrade, op_err()));
        root.add_child(Step::leaf("b", StepCategory::Upgrade, op_ok()).dependent());
        let outcome = execute(&mut root, &controller, false, true).await;
        assert_eq!(outcome, ExecuteOutcome::Failed);
        assert_eq!(root.children[0].state, StepState::Failed);
        assert_eq!(root.children[1].state, StepState::Skipped);
    }

    #[tokio::test]
    async fn a_non_dependent_sibling_still_runs_after_a_failure() {
        let controller = RecordReplayControllerClient::empty();
        let mut root = Step::new("root", StepCategory::UpgradePlan, false);
        root.add_child(Step::leaf("a", StepCategory::Upgrade, op_err()));
        root.add_child(Step::leaf("b", StepCategory::Upgrade, op_ok()));
        let outcome = execute(&mut root, &controller, false, true).await;
        assert_eq!(outcome, ExecuteOutcome::Failed);
        assert_eq!(root.children[1].state, StepState::Done);
    }

    #[tokio::test]
    async fn parallel_group_reports_the_worst_child_state() {
        let controller = RecordReplayControllerClient::empty();
        let mut root = Step::new("root", StepCategory::HypervisorUpgradePlan, true);
        root.add_child(Step::leaf("a", StepCategory::Unit, op_ok()));
        root.add_child(Step::leaf("b", StepCategory::Unit, op_err()));
        let outcome = execute(&mut root, &controller, false, true).await;
        assert_eq!(outcome, ExecuteOutcome::Failed);
        assert_eq!(root.worst_child_state(), StepState::Failed);
    }

    #[tokio::test]
    async fn disabling_parallel_still_runs_every_child_sequentially() {
        let controller = RecordReplayControllerClient::empty();
        let mut root = Step::new("root", StepCategory::HypervisorUpgradePlan, true);
        root.add_child(Step::leaf("a", StepCategory::Unit, op_ok()));
        root.add_child(Step::leaf("b", StepCategory::Unit, op_ok()));
        let outcome = execute(&mut root, &controller, false, false).await;
        assert_eq!(outcome, ExecuteOutcome::Completed);
        assert!(root.children.iter().all(|c| c.state == StepState::Done));
    }
}
