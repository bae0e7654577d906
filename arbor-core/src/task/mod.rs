//! Task execution, progress reporting and completion broadcast

mod completion;
mod executor;
mod progress;

pub use completion::{Completion, CompletionNotifier, SubscriptionId, TaskFailure, TaskOutcome};
pub use executor::{Task, TaskExecutor, TaskHandle, TaskState};
pub use progress::{NoProgress, Phase, Progress, ProgressReporter, TracingProgress};
