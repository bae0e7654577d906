//! Arbor Core - repository, branch and clone orchestration over libgit2
//!
//! A [`Repository`] is opened or cloned (on the caller or on a background
//! worker), then branches are listed, forked, switched and removed through
//! [`Branch`] handles. Background clones report progress through a
//! [`ProgressReporter`] and finish with exactly one [`Completion`].

pub mod config;
pub mod error;
pub mod git;
pub mod task;

pub use config::{CloneSettings, Config};
pub use error::{Error, ErrorKind, Result};
pub use git::{Branch, BranchKind, CloneUrl, Connection, Oid, Remote, RemoteRef, Repository};
pub use task::{
    Completion, CompletionNotifier, NoProgress, Phase, Progress, ProgressReporter, SubscriptionId, Task,
    TaskExecutor, TaskFailure, TaskHandle, TaskOutcome, TaskState, TracingProgress,
};
