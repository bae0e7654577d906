//! Completion broadcast for finished tasks

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, ErrorKind};

/// Why a task failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&Error> for TaskFailure {
    fn from(err: &Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Result of running a task to completion
pub type TaskOutcome = std::result::Result<(), TaskFailure>;

/// Payload delivered to completion subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Short label of the task that finished (e.g. "clone")
    pub task: String,
    pub outcome: TaskOutcome,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.outcome.as_ref().err().map(|f| f.kind)
    }
}

/// Token returned by [`CompletionNotifier::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Completion) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
}

/// Observer list delivering a [`Completion`] to every current subscriber
///
/// Handlers are snapshotted before dispatch and no lock is held while they
/// run, so a handler may subscribe or unsubscribe (itself included). Changes
/// made during a dispatch take effect from the next notification.
#[derive(Clone, Default)]
pub struct CompletionNotifier {
    inner: Arc<Mutex<Subscribers>>,
}

impl fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler; it stays registered until unsubscribed
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        let mut subs = self.lock();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.handlers.push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.lock();
        let before = subs.handlers.len();
        subs.handlers.retain(|(sid, _)| *sid != id);
        subs.handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().handlers.len()
    }

    /// Deliver `completion` to every handler registered at call time
    pub fn notify(&self, completion: &Completion) {
        let snapshot: Vec<Handler> = self.lock().handlers.iter().map(|(_, h)| h.clone()).collect();

        tracing::trace!(
            task = %completion.task,
            success = completion.is_success(),
            subscribers = snapshot.len(),
            "Dispatching completion"
        );

        for handler in snapshot {
            handler(completion);
        }
    }
}
