//! Steppable tasks: work split into a fixed number of discrete steps.
//!
//! A [`SteppableTask`] wraps a unit of work and enforces a small state machine:
//!
//! ```text
//! Created --plan()--> Planned --step()--> Stepping --step()...--> Complete
//!                                                    \--error--> Failed
//! ```
//!
//! The step count is fixed by [`Plan::plan`] before the first step runs. Each
//! call to [`SteppableTask::step`] performs exactly one unit of work against a
//! caller supplied target. Calling `step` on a task that is not steppable
//! (unplanned, complete or failed) is rejected with [`TaskError::NotSteppable`].
//!
//! The same contract is shared by the asset parsers (target: engine state) and
//! the image exporter (target: the output byte buffer).

use std::fmt;
use thiserror::Error;

/// Computes the step plan of a unit of work.
pub trait Plan {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the total number of steps. Called exactly once.
    fn plan(&mut self) -> Result<usize, Self::Error>;
}

/// Executes one planned step against a target.
pub trait Step<T: ?Sized>: Plan {
    /// Runs step `index` (0-based, strictly increasing across calls).
    fn step(&mut self, index: usize, target: &mut T) -> Result<(), Self::Error>;
}

impl<P: Plan + ?Sized> Plan for Box<P> {
    type Error = P::Error;

    fn plan(&mut self) -> Result<usize, Self::Error> {
        (**self).plan()
    }
}

impl<T: ?Sized, P: Step<T> + ?Sized> Step<T> for Box<P> {
    fn step(&mut self, index: usize, target: &mut T) -> Result<(), Self::Error> {
        (**self).step(index, target)
    }
}

/// Lifecycle of a [`SteppableTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Constructed, step count not yet computed.
    Created,
    /// Step count fixed, no step executed yet.
    Planned,
    Stepping,
    Complete,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Complete | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Created => "created",
            TaskState::Planned => "planned",
            TaskState::Stepping => "stepping",
            TaskState::Complete => "complete",
            TaskState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Errors raised by the task state machine.
#[derive(Error, Debug)]
pub enum TaskError<E> {
    #[error("Task has already been planned")]
    AlreadyPlanned,

    #[error("Task cannot step while {0}")]
    NotSteppable(TaskState),

    #[error("Planning failed: {0}")]
    PlanFailed(#[source] E),

    #[error("Step {step} failed: {source}")]
    StepFailed {
        step: usize,
        #[source]
        source: E,
    },
}

/// A unit of work executed one step at a time.
#[derive(Debug)]
pub struct SteppableTask<W> {
    work: W,
    state: TaskState,
    total: usize,
    completed: usize,
}

impl<W: Plan> SteppableTask<W> {
    pub fn new(work: W) -> Self {
        Self {
            work,
            state: TaskState::Created,
            total: 0,
            completed: 0,
        }
    }

    /// Builds and plans a task in one go.
    pub fn planned(work: W) -> Result<Self, TaskError<W::Error>> {
        let mut task = Self::new(work);
        task.plan()?;
        Ok(task)
    }

    /// Fixes the step count. A second call is rejected.
    ///
    /// A plan of zero steps completes the task immediately.
    pub fn plan(&mut self) -> Result<usize, TaskError<W::Error>> {
        if self.state != TaskState::Created {
            return Err(TaskError::AlreadyPlanned);
        }

        match self.work.plan() {
            Ok(total) => {
                self.total = total;
                self.state = if total == 0 {
                    TaskState::Complete
                } else {
                    TaskState::Planned
                };
                Ok(total)
            }
            Err(e) => {
                self.state = TaskState::Failed;
                Err(TaskError::PlanFailed(e))
            }
        }
    }

    /// Executes exactly one step and returns the resulting state.
    pub fn step<T: ?Sized>(&mut self, target: &mut T) -> Result<TaskState, TaskError<W::Error>>
    where
        W: Step<T>,
    {
        match self.state {
            TaskState::Planned | TaskState::Stepping => {}
            other => return Err(TaskError::NotSteppable(other)),
        }

        let index = self.completed;
        self.state = TaskState::Stepping;

        if let Err(source) = self.work.step(index, target) {
            self.state = TaskState::Failed;
            return Err(TaskError::StepFailed {
                step: index,
                source,
            });
        }

        self.completed += 1;
        if self.completed == self.total {
            self.state = TaskState::Complete;
        }

        Ok(self.state)
    }

    /// Plans if needed, then steps until the task is terminal.
    pub fn run_to_completion<T: ?Sized>(&mut self, target: &mut T) -> Result<(), TaskError<W::Error>>
    where
        W: Step<T>,
    {
        if self.state == TaskState::Created {
            self.plan()?;
        }

        while !self.state.is_terminal() {
            self.step(target)?;
        }

        match self.state {
            TaskState::Complete => Ok(()),
            other => Err(TaskError::NotSteppable(other)),
        }
    }
}

impl<W> SteppableTask<W> {
    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn total_steps(&self) -> usize {
        self.total
    }

    pub fn completed_steps(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.state == TaskState::Complete
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Planned steps that have not run.
    pub fn remaining_steps(&self) -> usize {
        self.total - self.completed
    }

    pub fn work(&self) -> &W {
        &self.work
    }

    pub fn work_mut(&mut self) -> &mut W {
        &mut self.work
    }

    pub fn into_work(self) -> W {
        self.work
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    /// Appends its step index to the target; fails at `fail_at`.
    struct Counter {
        steps: usize,
        fail_at: Option<usize>,
    }

    impl Plan for Counter {
        type Error = Boom;

        fn plan(&mut self) -> Result<usize, Boom> {
            Ok(self.steps)
        }
    }

    impl Step<Vec<usize>> for Counter {
        fn step(&mut self, index: usize, target: &mut Vec<usize>) -> Result<(), Boom> {
            if self.fail_at == Some(index) {
                return Err(Boom);
            }
            target.push(index);
            Ok(())
        }
    }

    fn counter(steps: usize) -> Counter {
        Counter {
            steps,
            fail_at: None,
        }
    }

    #[test]
    fn test_steps_until_complete() {
        let mut task = SteppableTask::planned(counter(3)).unwrap();
        let mut out = Vec::new();

        assert_eq!(task.state(), TaskState::Planned);
        assert_eq!(task.step(&mut out).unwrap(), TaskState::Stepping);
        assert_eq!(task.step(&mut out).unwrap(), TaskState::Stepping);
        assert_eq!(task.step(&mut out).unwrap(), TaskState::Complete);

        assert_eq!(out, vec![0, 1, 2]);
        assert_eq!(task.completed_steps(), task.total_steps());
        assert!(task.is_complete());
    }

    #[test]
    fn test_step_after_complete_is_rejected() {
        let mut task = SteppableTask::planned(counter(1)).unwrap();
        let mut out = Vec::new();
        task.step(&mut out).unwrap();

        let err = task.step(&mut out).unwrap_err();
        assert!(matches!(err, TaskError::NotSteppable(TaskState::Complete)));
        assert_eq!(out.len(), 1);
        assert_eq!(task.completed_steps(), 1);
    }

    #[test]
    fn test_step_before_plan_is_rejected() {
        let mut task = SteppableTask::new(counter(2));
        let err = task.step(&mut Vec::new()).unwrap_err();
        assert!(matches!(err, TaskError::NotSteppable(TaskState::Created)));
    }

    #[test]
    fn test_plan_twice_is_rejected() {
        let mut task = SteppableTask::planned(counter(2)).unwrap();
        assert!(matches!(task.plan(), Err(TaskError::AlreadyPlanned)));
        assert_eq!(task.total_steps(), 2);
    }

    #[test]
    fn test_failed_step_is_terminal() {
        let mut task = SteppableTask::planned(Counter {
            steps: 3,
            fail_at: Some(1),
        })
        .unwrap();
        let mut out = Vec::new();

        task.step(&mut out).unwrap();
        let err = task.step(&mut out).unwrap_err();
        assert!(matches!(err, TaskError::StepFailed { step: 1, .. }));
        assert_eq!(task.state(), TaskState::Failed);
        assert!(task.is_terminal());
        assert!(!task.is_complete());

        // Prior mutations stay in place.
        assert_eq!(out, vec![0]);
        assert!(matches!(
            task.step(&mut out),
            Err(TaskError::NotSteppable(TaskState::Failed))
        ));
    }

    #[test]
    fn test_zero_step_plan_completes_immediately() {
        let task = SteppableTask::planned(counter(0)).unwrap();
        assert!(task.is_complete());
        assert_eq!(task.remaining_steps(), 0);
    }

    #[test]
    fn test_run_to_completion_plans_lazily() {
        let mut task = SteppableTask::new(counter(4));
        let mut out = Vec::new();
        task.run_to_completion(&mut out).unwrap();
        assert_eq!(out, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_boxed_work_steps_through_trait_object() {
        trait Job: Step<Vec<usize>, Error = Boom> {}
        impl Job for Counter {}

        let boxed: Box<dyn Job> = Box::new(counter(2));
        let mut task = SteppableTask::planned(boxed).unwrap();
        let mut out = Vec::new();
        task.run_to_completion(&mut out).unwrap();
        assert_eq!(out, vec![0, 1]);
    }
}
