use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::WorkerConfig;
use crate::models::{GetterFn, Task, TaskKind, WorkerError, WorkerMode};
use crate::orchestration::admission::{AdmissionGate, Runner};
use crate::orchestration::{TaskContext, WorkerResult};

/// Scatter-gather executor over a registry of named tasks.
///
/// Every invocation starts one runner per task but admits only one task at a
/// time, so tasks run sequentially in an unspecified order. The first task
/// error or context cancellation aborts the invocation; no partial result is
/// returned.
///
/// Invocations borrow the worker immutably and keep their coordination state
/// private, so one worker can serve several concurrent invocations.
pub struct Worker<A, V> {
    mode: WorkerMode,
    tasks: HashMap<String, TaskEntry<A, V>>,
    config: WorkerConfig,
}

struct TaskEntry<A, V> {
    task: Task<A, V>,
    argument: Option<A>,
}

impl<A, V> Default for Worker<A, V> {
    fn default() -> Self {
        Self {
            mode: WorkerMode::Unset,
            tasks: HashMap::new(),
            config: WorkerConfig::default(),
        }
    }
}

impl<A, V> Worker<A, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WorkerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn mode(&self) -> WorkerMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<TaskKind> {
        self.tasks.get(name).map(|entry| entry.task.kind())
    }

    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Adds `task` under `name`, replacing any task already registered there.
    ///
    /// The first registration fixes the worker's mode. `argument`, when given,
    /// is passed to this task instead of the invocation's default argument.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        task: Task<A, V>,
        argument: Option<A>,
    ) -> WorkerResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(WorkerError::InvalidName);
        }

        let kind = task.kind();
        if !self.mode.accepts(kind) {
            tracing::warn!(
                worker = self.config.label_or_default(),
                task = %name,
                mode = ?self.mode,
                attempted = ?kind,
                "rejected task registration with mismatched kind"
            );
            return Err(WorkerError::ModeMismatch {
                task: name,
                mode: self.mode,
                attempted: kind,
            });
        }

        self.mode = WorkerMode::from(kind);
        if self
            .tasks
            .insert(name.clone(), TaskEntry { task, argument })
            .is_some()
        {
            tracing::debug!(
                worker = self.config.label_or_default(),
                task = %name,
                "replaced previously registered task"
            );
        }

        Ok(())
    }
}

impl<A, V> Worker<A, V>
where
    A: 'static,
    V: 'static,
{
    /// Registers a type-erased callable.
    ///
    /// Accepts a boxed [`Task`] or [`GetterFn`] for this worker's argument
    /// and value types; anything else is rejected with
    /// [`WorkerError::UnsupportedTask`]. Senders are passed as a [`Task`]
    /// built with [`Task::sender`], which fixes the value they record.
    pub fn register_dyn(
        &mut self,
        name: impl Into<String>,
        task: Box<dyn Any + Send>,
        argument: Option<A>,
    ) -> WorkerResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(WorkerError::InvalidName);
        }

        let task = match classify(task) {
            Some(task) => task,
            None => {
                tracing::warn!(
                    worker = self.config.label_or_default(),
                    task = %name,
                    "rejected task registration with unsupported signature"
                );
                return Err(WorkerError::UnsupportedTask { task: name });
            }
        };

        self.register(name, task, argument)
    }
}

impl<A, V> Worker<A, V>
where
    A: Clone + Send + 'static,
    V: Send + 'static,
{
    /// Runs every registered task and gathers their values by name.
    pub async fn invoke(
        &self,
        context: &TaskContext,
        default_argument: A,
    ) -> WorkerResult<HashMap<String, V>> {
        if self.tasks.is_empty() {
            return Err(WorkerError::EmptyTaskSet);
        }

        let label = self.config.label_or_default();
        let context = match self.config.timeout() {
            Some(timeout) => context.child_with_timeout(timeout),
            None => context.clone(),
        };
        let expected = self.tasks.len();

        let gate = AdmissionGate::new();
        let (reports_tx, mut reports_rx) = mpsc::channel(expected);
        for (name, entry) in &self.tasks {
            Runner {
                task_name: Arc::from(name.as_str()),
                task: entry.task.clone(),
                argument: entry
                    .argument
                    .clone()
                    .unwrap_or_else(|| default_argument.clone()),
                context: context.clone(),
                admission: gate.admission(),
                reports: reports_tx.clone(),
            }
            .spawn();
        }
        drop(reports_tx);
        tracing::debug!(worker = label, tasks = expected, "dispatched task runners");

        let mut results = HashMap::with_capacity(expected);
        while results.len() < expected {
            if context.is_cancelled() {
                tracing::debug!(
                    worker = label,
                    completed = results.len(),
                    tasks = expected,
                    "invocation cancelled before admission"
                );
                return Err(WorkerError::Cancelled);
            }
            gate.grant();

            let report = tokio::select! {
                biased;
                _ = context.cancelled() => {
                    tracing::debug!(
                        worker = label,
                        completed = results.len(),
                        tasks = expected,
                        "invocation cancelled while a task was running"
                    );
                    return Err(WorkerError::Cancelled);
                }
                report = reports_rx.recv() => report,
            };

            // Runners only exit without reporting once the context is cancelled.
            let Some(report) = report else {
                return Err(WorkerError::Cancelled);
            };

            match report.outcome {
                Ok(value) => {
                    results.insert(report.task.to_string(), value);
                }
                Err(error) => {
                    tracing::warn!(
                        worker = label,
                        task = %report.task,
                        error = %error,
                        "task failed; abandoning remaining tasks"
                    );
                    return Err(error);
                }
            }
        }

        tracing::debug!(worker = label, tasks = expected, "invocation completed");
        Ok(results)
    }

    /// Same as [`Worker::invoke`] but only reports success or failure.
    pub async fn execute(&self, context: &TaskContext, default_argument: A) -> WorkerResult<()> {
        self.invoke(context, default_argument).await.map(|_| ())
    }
}

fn classify<A, V>(task: Box<dyn Any + Send>) -> Option<Task<A, V>>
where
    A: 'static,
    V: 'static,
{
    let task = match task.downcast::<Task<A, V>>() {
        Ok(task) => return Some(*task),
        Err(other) => other,
    };
    task.downcast::<GetterFn<A, V>>()
        .ok()
        .map(|getter| Task::Getter(*getter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SenderFn, TaskFuture};

    #[test]
    fn classify_rejects_plain_closures() {
        let closure = |_: u8| 1_u8;
        assert!(classify::<u8, u8>(Box::new(closure)).is_none());
        assert!(classify::<u8, u8>(Box::new("not a task")).is_none());
    }

    #[test]
    fn classify_accepts_getter_handles_and_built_tasks() {
        let getter: GetterFn<u8, u8> = Arc::new(|_: TaskContext, argument: u8| {
            Box::pin(async move { Ok(argument) }) as TaskFuture<u8>
        });
        let sender: SenderFn<u8> =
            Arc::new(|_: TaskContext, _: u8| Box::pin(async { Ok(()) }) as TaskFuture<()>);

        let classified = classify::<u8, u8>(Box::new(getter)).unwrap();
        assert_eq!(classified.kind(), TaskKind::Getter);
        assert!(classify::<u8, u8>(Box::new(sender)).is_none());

        let built: Task<u8, u8> = Task::sender(|_, _| async { Ok(()) });
        let classified = classify::<u8, u8>(Box::new(built)).unwrap();
        assert_eq!(classified.kind(), TaskKind::Sender);
    }
}
