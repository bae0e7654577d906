//! Task execution on the caller or on a dedicated worker thread

use std::future::{Future, IntoFuture};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tokio::sync::oneshot;

use super::completion::{Completion, CompletionNotifier, TaskFailure, TaskOutcome};
use crate::error::{ErrorKind, Result};

/// A unit of work run by [`TaskExecutor`]
pub trait Task: Send + 'static {
    /// Short label used for the worker thread name, logs and completion payloads
    fn name(&self) -> &str;

    /// Whether the task runs on the caller's thread
    fn is_blocking(&self) -> bool;

    /// The task body. Called exactly once.
    fn run(&mut self) -> Result<()>;
}

/// Lifecycle of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Completed(TaskOutcome),
}

impl TaskState {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskState::Completed(_))
    }
}

type SharedState = Arc<Mutex<TaskState>>;

fn set_state(state: &SharedState, next: TaskState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

/// Handle to a task started by [`TaskExecutor::exec`]
///
/// Can be waited on synchronously with [`TaskHandle::wait`] or awaited.
/// Dropping the handle does not affect the task.
#[derive(Debug)]
pub struct TaskHandle {
    task: String,
    state: SharedState,
    rx: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    /// Label of the task
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Snapshot of the task's current state
    pub fn state(&self) -> TaskState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_completed()
    }

    /// Block until the task completes and return its outcome
    ///
    /// Returns immediately for tasks that already completed. Waiting on an
    /// unfinished task from inside an async runtime panics; await the handle
    /// instead.
    pub fn wait(mut self) -> TaskOutcome {
        match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Closed) => recorded_outcome(&self.state),
            Err(oneshot::error::TryRecvError::Empty) => match self.rx.blocking_recv() {
                Ok(outcome) => outcome,
                Err(_) => recorded_outcome(&self.state),
            },
        }
    }
}

impl IntoFuture for TaskHandle {
    type Output = TaskOutcome;
    type IntoFuture = Pin<Box<dyn Future<Output = TaskOutcome> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            match self.rx.await {
                Ok(outcome) => outcome,
                Err(_) => recorded_outcome(&self.state),
            }
        })
    }
}

/// Outcome for a handle whose sender went away without sending
fn recorded_outcome(state: &SharedState) -> TaskOutcome {
    match &*state.lock().unwrap_or_else(PoisonError::into_inner) {
        TaskState::Completed(outcome) => outcome.clone(),
        _ => Err(TaskFailure::new(
            ErrorKind::Internal,
            "task ended without reporting completion",
        )),
    }
}

/// Everything needed to run a task and report its completion, owned as one unit
struct Job<T: Task> {
    task: T,
    notifier: CompletionNotifier,
    state: SharedState,
    tx: oneshot::Sender<TaskOutcome>,
}

impl<T: Task> Job<T> {
    fn execute(mut self) {
        let name = self.task.name().to_string();
        set_state(&self.state, TaskState::Running);
        tracing::debug!(task = %name, "Task started");

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.task.run())) {
            Ok(Ok(())) => {
                tracing::debug!(task = %name, "Task done");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(task = %name, error = %e, "Task failed");
                Err(TaskFailure::from(&e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(task = %name, panic = %message, "Task panicked");
                Err(TaskFailure::new(
                    ErrorKind::Internal,
                    format!("task panicked: {}", message),
                ))
            }
        };

        // Release the task's resources before anyone is told it finished.
        drop(self.task);

        finish(&name, outcome, &self.state, &self.notifier, self.tx);
    }
}

fn finish(
    name: &str,
    outcome: TaskOutcome,
    state: &SharedState,
    notifier: &CompletionNotifier,
    tx: oneshot::Sender<TaskOutcome>,
) {
    set_state(state, TaskState::Completed(outcome.clone()));
    notifier.notify(&Completion {
        task: name.to_string(),
        outcome: outcome.clone(),
    });
    // The handle may have been dropped; that is fine.
    let _ = tx.send(outcome);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs tasks and broadcasts exactly one completion per task
///
/// Blocking tasks run entirely on the caller. Each non-blocking task gets
/// its own worker thread for its whole lifetime; there is no pool.
#[derive(Debug, Clone, Default)]
pub struct TaskExecutor {
    notifier: CompletionNotifier,
}

impl TaskExecutor {
    /// Create an executor that reports completions to `notifier`
    pub fn new(notifier: CompletionNotifier) -> Self {
        Self { notifier }
    }

    pub fn notifier(&self) -> &CompletionNotifier {
        &self.notifier
    }

    /// Run `task`, returning once it finished (blocking) or once its worker started
    pub fn exec<T: Task>(&self, task: T) -> TaskHandle {
        let (tx, rx) = oneshot::channel();
        let state: SharedState = Arc::new(Mutex::new(TaskState::Created));
        let name = task.name().to_string();
        let blocking = task.is_blocking();
        let handle = TaskHandle {
            task: name.clone(),
            state: state.clone(),
            rx,
        };

        let job = Job {
            task,
            notifier: self.notifier.clone(),
            state: state.clone(),
            tx,
        };

        if blocking {
            job.execute();
            return handle;
        }

        let spawned = thread::Builder::new()
            .name(format!("arbor-{}", name))
            .spawn(move || job.execute());

        if let Err(e) = spawned {
            // The job (and its sender) went down with the closure; report through
            // the shared state so the handle and subscribers still see one completion.
            tracing::error!(task = %name, error = %e, "Failed to spawn task worker");
            let outcome = Err(TaskFailure::new(
                ErrorKind::Internal,
                format!("failed to spawn worker: {}", e),
            ));
            set_state(&state, TaskState::Completed(outcome.clone()));
            self.notifier.notify(&Completion {
                task: name,
                outcome,
            });
        }

        handle
    }

    /// Complete a task that was refused before it could start
    ///
    /// Subscribers get the single failure completion; the returned handle is
    /// already finished.
    pub fn reject(&self, name: &str, failure: TaskFailure) -> TaskHandle {
        let (tx, rx) = oneshot::channel();
        let state: SharedState = Arc::new(Mutex::new(TaskState::Created));
        tracing::warn!(task = %name, reason = %failure, "Task rejected");
        finish(name, Err(failure), &state, &self.notifier, tx);
        TaskHandle {
            task: name.to_string(),
            state,
            rx,
        }
    }
}
