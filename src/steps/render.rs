//! Pretty-printing for a [`super::Step`] tree: tab-indented, depth-first,
//! each line tagged with its category.

use std::fmt;

use super::{Step, StepState};

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, 0, f)
    }
}

fn render(step: &Step, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("\t")?;
    }
    match step.category.tag() {
        Some(tag) => write!(f, "[{tag}] {}", step.description)?,
        None => write!(f, "{}", step.description)?,
    }
    write!(f, " ({})", state_label(step.state))?;
    if step.parallel && !step.children.is_empty() {
        f.write_str(" [parallel]")?;
    }
    writeln!(f)?;
    for child in &step.children {
        render(child, depth + 1, f)?;
    }
    Ok(())
}

fn state_label(state: StepState) -> &'static str {
    match state {
        StepState::Pending => "pending",
        StepState::Running => "running",
        StepState::Done => "done",
        StepState::Failed => "failed",
        StepState::Skipped => "skipped",
        StepState::Canceled => "canceled",
    }
}
