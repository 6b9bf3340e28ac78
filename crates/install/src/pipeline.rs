//! Ordered, rollbackable steps.
//!
//! A [`Pipeline`] runs its steps in order against a shared context. When a
//! step fails (or the run is cancelled between steps) every step that already
//! ran is undone in reverse order. Undo failures do not stop the rollback;
//! they are collected into the [`RollbackReport`].
//!
//! The failing step itself is not undone: a step's action is expected to
//! leave nothing behind when it returns an error.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the caller and workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type Condition<'a, C> = Box<dyn Fn(&C) -> bool + 'a>;
type Action<'a, C, E> = Box<dyn FnMut(&mut C) -> Result<(), E> + 'a>;

/// One named step: an optional condition, an action and an optional undo.
pub struct Step<'a, C, E> {
    name: String,
    condition: Option<Condition<'a, C>>,
    action: Action<'a, C, E>,
    undo: Option<Action<'a, C, E>>,
}

impl<'a, C, E> Step<'a, C, E> {
    pub fn new(name: impl Into<String>, action: impl FnMut(&mut C) -> Result<(), E> + 'a) -> Self {
        Self {
            name: name.into(),
            condition: None,
            action: Box::new(action),
            undo: None,
        }
    }

    /// Runs the step only when `condition` holds at the time it is reached.
    pub fn when(mut self, condition: impl Fn(&C) -> bool + 'a) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    pub fn undo(mut self, undo: impl FnMut(&mut C) -> Result<(), E> + 'a) -> Self {
        self.undo = Some(Box::new(undo));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C, E> fmt::Debug for Step<'_, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("conditional", &self.condition.is_some())
            .field("has_undo", &self.undo.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Skipped by its condition, or never reached.
    NotRun,
    Run,
    Failed,
    Undone,
    UndoFailed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRun => "not_run",
            Self::Run => "run",
            Self::Failed => "failed",
            Self::Undone => "undone",
            Self::UndoFailed => "undo_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
}

/// Outcome of a pipeline that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub records: Vec<StepRecord>,
}

impl PipelineReport {
    /// Names of steps whose action ran.
    pub fn ran(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(|r| r.status == StepStatus::Run)
            .map(|r| r.name.as_str())
    }
}

/// Result of undoing the steps that ran before a failure.
#[derive(Debug)]
pub struct RollbackReport<E> {
    /// Steps undone successfully, in the order they were undone.
    pub undone: Vec<String>,
    /// Steps whose undo failed, with the error.
    pub failures: Vec<(String, E)>,
}

impl<E> RollbackReport<E> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<E> Default for RollbackReport<E> {
    fn default() -> Self {
        Self {
            undone: Vec::new(),
            failures: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum FailureCause<E> {
    Step(E),
    /// The cancel token was raised before the step started.
    Cancelled,
}

/// A pipeline that stopped early and was rolled back.
#[derive(Debug)]
pub struct PipelineFailure<E> {
    /// Step that failed, or that was about to start when cancelled.
    pub step: String,
    pub cause: FailureCause<E>,
    pub records: Vec<StepRecord>,
    pub rollback: RollbackReport<E>,
}

/// An ordered list of steps over a context `C`, failing with `E`.
pub struct Pipeline<'a, C, E> {
    steps: Vec<Step<'a, C, E>>,
}

impl<C, E> Default for Pipeline<'_, C, E> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<'a, C, E> Pipeline<'a, C, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: Step<'a, C, E>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order, rolling back on the first failure.
    pub fn execute(
        mut self,
        ctx: &mut C,
        cancel: &CancelToken,
    ) -> Result<PipelineReport, PipelineFailure<E>> {
        let mut records: Vec<StepRecord> = self
            .steps
            .iter()
            .map(|s| StepRecord {
                name: s.name.clone(),
                status: StepStatus::NotRun,
            })
            .collect();

        for index in 0..self.steps.len() {
            let step = &mut self.steps[index];
            if cancel.is_cancelled() {
                tracing::info!(target: "brain::pipeline", step = %step.name, "Cancelled before step");
                let rollback = rollback(&mut self.steps[..index], &mut records, ctx);
                return Err(PipelineFailure {
                    step: records[index].name.clone(),
                    cause: FailureCause::Cancelled,
                    records,
                    rollback,
                });
            }
            if let Some(condition) = &step.condition {
                if !condition(ctx) {
                    tracing::debug!(target: "brain::pipeline", step = %step.name, "Skipped");
                    continue;
                }
            }

            tracing::debug!(target: "brain::pipeline", step = %step.name, "Running step");
            match (step.action)(ctx) {
                Ok(()) => records[index].status = StepStatus::Run,
                Err(e) => {
                    records[index].status = StepStatus::Failed;
                    tracing::warn!(target: "brain::pipeline", step = %step.name, "Step failed; rolling back");
                    let rollback = rollback(&mut self.steps[..index], &mut records, ctx);
                    return Err(PipelineFailure {
                        step: records[index].name.clone(),
                        cause: FailureCause::Step(e),
                        records,
                        rollback,
                    });
                }
            }
        }
        Ok(PipelineReport { records })
    }
}

/// Undoes every step recorded as run, last first.
fn rollback<C, E>(
    steps: &mut [Step<'_, C, E>],
    records: &mut [StepRecord],
    ctx: &mut C,
) -> RollbackReport<E> {
    let mut report = RollbackReport::default();
    for (step, record) in steps.iter_mut().zip(records.iter_mut()).rev() {
        if record.status != StepStatus::Run {
            continue;
        }
        let Some(undo) = step.undo.as_mut() else {
            record.status = StepStatus::Undone;
            report.undone.push(step.name.clone());
            continue;
        };
        match undo(ctx) {
            Ok(()) => {
                record.status = StepStatus::Undone;
                report.undone.push(step.name.clone());
            }
            Err(e) => {
                tracing::warn!(target: "brain::pipeline", step = %step.name, "Undo failed");
                record.status = StepStatus::UndoFailed;
                report.failures.push((step.name.clone(), e));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<String>);

    fn logging_step(name: &'static str) -> Step<'static, Log, String> {
        Step::new(name, move |log: &mut Log| {
            log.0.push(format!("do {name}"));
            Ok(())
        })
        .undo(move |log: &mut Log| {
            log.0.push(format!("undo {name}"));
            Ok(())
        })
    }

    fn failing_step(name: &'static str) -> Step<'static, Log, String> {
        Step::new(name, move |_: &mut Log| Err(format!("{name} broke")))
            .undo(|_: &mut Log| panic!("failed step must not be undone"))
    }

    #[test]
    fn runs_all_steps_in_order() {
        let mut log = Log::default();
        let report = Pipeline::new()
            .step(logging_step("a"))
            .step(logging_step("b"))
            .execute(&mut log, &CancelToken::new())
            .unwrap();
        assert_eq!(log.0, ["do a", "do b"]);
        assert_eq!(report.ran().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn third_step_failure_undoes_first_two_in_reverse() {
        let mut log = Log::default();
        let failure = Pipeline::new()
            .step(logging_step("detect"))
            .step(logging_step("clean"))
            .step(failing_step("place"))
            .step(logging_step("manifest"))
            .execute(&mut log, &CancelToken::new())
            .unwrap_err();

        assert_eq!(log.0, ["do detect", "do clean", "undo clean", "undo detect"]);
        assert_eq!(failure.step, "place");
        assert!(matches!(failure.cause, FailureCause::Step(ref e) if e == "place broke"));
        assert!(failure.rollback.is_complete());
        let statuses: Vec<_> = failure.records.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            [
                StepStatus::Undone,
                StepStatus::Undone,
                StepStatus::Failed,
                StepStatus::NotRun
            ]
        );
    }

    #[test]
    fn undo_failure_is_aggregated_and_rollback_continues() {
        let mut log = Log::default();
        let failure = Pipeline::new()
            .step(logging_step("one"))
            .step(
                Step::new("two", |log: &mut Log| {
                    log.0.push("do two".into());
                    Ok(())
                })
                .undo(|_: &mut Log| Err("cannot undo two".to_string())),
            )
            .step(failing_step("three"))
            .execute(&mut log, &CancelToken::new())
            .unwrap_err();

        assert_eq!(log.0, ["do one", "do two", "undo one"]);
        assert_eq!(failure.rollback.undone, ["one"]);
        assert_eq!(
            failure.rollback.failures,
            vec![("two".to_string(), "cannot undo two".to_string())]
        );
        assert_eq!(failure.records[1].status, StepStatus::UndoFailed);
    }

    #[test]
    fn skipped_steps_are_not_undone() {
        let mut log = Log::default();
        let failure = Pipeline::new()
            .step(logging_step("a"))
            .step(logging_step("skipped").when(|_: &Log| false))
            .step(failing_step("c"))
            .execute(&mut log, &CancelToken::new())
            .unwrap_err();
        assert_eq!(log.0, ["do a", "undo a"]);
        assert_eq!(failure.records[1].status, StepStatus::NotRun);
    }

    #[test]
    fn cancel_between_steps_rolls_back() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let mut log = Log::default();
        let failure = Pipeline::new()
            .step(Step::new("first", move |log: &mut Log| {
                log.0.push("do first".into());
                trigger.cancel();
                Ok(())
            })
            .undo(|log: &mut Log| {
                log.0.push("undo first".into());
                Ok(())
            }))
            .step(logging_step("second"))
            .execute(&mut log, &cancel)
            .unwrap_err();

        assert!(matches!(failure.cause, FailureCause::Cancelled));
        assert_eq!(failure.step, "second");
        assert_eq!(log.0, ["do first", "undo first"]);
    }
}
