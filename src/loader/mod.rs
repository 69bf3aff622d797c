//! Load passes: the queue that steps parsers and the service that drives it.

pub mod queue;
pub mod service;

pub use queue::LoadQueue;
pub use service::{CompletionCallback, LoadHandle, LoadService};

use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::parsers::{ParseError, ParserKind};

/// Errors that end a load pass.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to list files: {0}")]
    Listing(#[source] io::Error),

    #[error("Task for {path} must be planned before it is enqueued")]
    Unplanned { path: String },

    #[error("Planning {path} failed: {source}")]
    Plan {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("{kind} parser failed at step {step}: {source}")]
    Parse {
        path: String,
        kind: ParserKind,
        step: usize,
        #[source]
        source: ParseError,
    },

    #[error("Task for {path} rejected a step: {reason}")]
    Task { path: String, reason: String },

    #[error("A load pass is already running")]
    AlreadyRunning,

    #[error("Step {step} of {path} took {elapsed:?}, limit is {limit:?}")]
    StepTimeout {
        path: String,
        step: usize,
        elapsed: Duration,
        limit: Duration,
    },

    #[error("Background load worker faulted: {0}")]
    BackgroundFault(String),
}

/// How a pass ended. Delivered exactly once per pass.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Completed,
    Failed(Arc<LoadError>),
    Cancelled,
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoadOutcome::Completed)
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            LoadOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Aggregate step counters of the running pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub completed: usize,
    pub total: usize,
    /// Path of the parser currently being stepped.
    pub current: Option<String>,
}

impl LoadProgress {
    /// `completed / total`, 0 for an empty pass.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f32 / self.total as f32
        }
    }

    /// Progress as a whole percentage.
    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor() as u8
    }
}

/// Broadcast notifications about load passes.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    Started { parsers: usize, total_steps: usize },
    Progress(LoadProgress),
    Finished(LoadOutcome),
}
