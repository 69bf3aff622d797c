use std::collections::VecDeque;

use crate::engine::DynEngine;
use crate::parsers::{Parser, ParserTask};
use crate::task::{SteppableTask, TaskError, TaskState};

use super::{LoadError, LoadProgress};

/// Ordered parser tasks plus aggregate step counters.
///
/// Tasks run strictly in enqueue order, one step per [`step_one`](Self::step_one).
/// A task that finishes is dropped from the front; the next call starts the
/// following task.
#[derive(Debug, Default)]
pub struct LoadQueue {
    tasks: VecDeque<ParserTask>,
    total_steps: usize,
    completed_steps: usize,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a planned task and adds its step count to the total.
    pub fn enqueue(&mut self, task: ParserTask) -> Result<(), LoadError> {
        if task.state() == TaskState::Created {
            return Err(LoadError::Unplanned {
                path: task.work().path().to_string(),
            });
        }

        self.total_steps += task.total_steps();
        self.completed_steps += task.completed_steps();
        if !task.is_terminal() {
            self.tasks.push_back(task);
        }
        Ok(())
    }

    /// Plans a parser and enqueues it.
    pub fn enqueue_parser(&mut self, parser: Box<dyn Parser>) -> Result<(), LoadError> {
        let path = parser.path().to_string();
        let task = SteppableTask::planned(parser).map_err(|e| match e {
            TaskError::PlanFailed(source) => LoadError::Plan { path, source },
            other => LoadError::Task {
                path,
                reason: other.to_string(),
            },
        })?;
        self.enqueue(task)
    }

    /// Runs one step of the front task and returns the progress fraction.
    ///
    /// A failing step removes its task and returns the error; later tasks stay queued.
    pub fn step_one(&mut self, engine: &mut DynEngine) -> Result<f32, LoadError> {
        let Some(task) = self.tasks.front_mut() else {
            return Ok(self.progress());
        };

        match task.step(engine) {
            Ok(state) => {
                self.completed_steps += 1;
                if state.is_terminal() {
                    if let Some(done) = self.tasks.pop_front() {
                        tracing::trace!("Finished {}", done.work().path());
                    }
                }
                Ok(self.progress())
            }
            Err(error) => {
                let path = task.work().path().to_string();
                let kind = task.work().kind();
                self.tasks.pop_front();
                Err(match error {
                    TaskError::StepFailed { step, source } => LoadError::Parse {
                        path,
                        kind,
                        step,
                        source,
                    },
                    other => LoadError::Task {
                        path,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// Steps until the queue is empty or a step fails.
    pub fn run_to_completion(&mut self, engine: &mut DynEngine) -> Result<(), LoadError> {
        while !self.tasks.is_empty() {
            self.step_one(engine)?;
        }
        Ok(())
    }

    /// Drops every task, finished or not, and zeroes the counters.
    pub fn reset(&mut self) {
        if !self.tasks.is_empty() {
            tracing::debug!("Abandoning {} queued parsers", self.tasks.len());
        }
        self.tasks.clear();
        self.total_steps = 0;
        self.completed_steps = 0;
    }

    /// `completed / total` across the queue, 0 when nothing was enqueued.
    pub fn progress(&self) -> f32 {
        self.snapshot().fraction()
    }

    pub fn snapshot(&self) -> LoadProgress {
        LoadProgress {
            completed: self.completed_steps,
            total: self.total_steps,
            current: self.current_path().map(str::to_string),
        }
    }

    /// Path of the task the next step will run.
    pub fn current_path(&self) -> Option<&str> {
        self.tasks.front().map(|task| task.work().path())
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks not yet finished.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn completed_steps(&self) -> usize {
        self.completed_steps
    }
}
