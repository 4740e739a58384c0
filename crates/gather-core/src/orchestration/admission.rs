use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};

use crate::models::{Task, WorkerError};
use crate::orchestration::TaskContext;
use crate::task_context::with_task_name;

/// Hands out admission grants to waiting runners, one at a time.
///
/// The gate starts without permits. Dropping it closes the semaphore, which
/// releases every runner still waiting for a grant.
pub(crate) struct AdmissionGate {
    permits: Arc<Semaphore>,
}

#[derive(Clone)]
pub(crate) struct Admission {
    permits: Arc<Semaphore>,
}

pub(crate) struct TaskReport<V> {
    pub task: Arc<str>,
    pub outcome: Result<V, WorkerError>,
}

impl AdmissionGate {
    pub(crate) fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    pub(crate) fn admission(&self) -> Admission {
        Admission {
            permits: self.permits.clone(),
        }
    }

    pub(crate) fn grant(&self) {
        self.permits.add_permits(1);
    }
}

impl Drop for AdmissionGate {
    fn drop(&mut self) {
        self.permits.close();
    }
}

impl Admission {
    /// Waits for a grant. Returns `false` once the gate has been closed.
    pub(crate) async fn admitted(&self) -> bool {
        match self.permits.acquire().await {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }
}

pub(crate) struct Runner<A, V> {
    pub task_name: Arc<str>,
    pub task: Task<A, V>,
    pub argument: A,
    pub context: TaskContext,
    pub admission: Admission,
    pub reports: mpsc::Sender<TaskReport<V>>,
}

impl<A, V> Runner<A, V>
where
    A: Send + 'static,
    V: Send + 'static,
{
    pub(crate) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(self) {
        let Runner {
            task_name,
            task,
            argument,
            context,
            admission,
            reports,
        } = self;

        tokio::select! {
            biased;
            _ = context.cancelled() => {
                tracing::debug!(task = %task_name, "context cancelled before admission");
                return;
            }
            admitted = admission.admitted() => {
                if !admitted {
                    tracing::debug!(task = %task_name, "admission gate closed before admission");
                    return;
                }
            }
        }

        tracing::debug!(task = %task_name, "task admitted");
        // The call itself happens inside the spawned task so a panic while
        // building the future is caught by the join handle too.
        let execution = tokio::spawn(with_task_name(task_name.clone(), async move {
            task.call(context, argument).await
        }));

        let outcome = match execution.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(WorkerError::TaskFailure(error)),
            Err(join_error) => {
                tracing::error!(
                    task = %task_name,
                    error = %join_error,
                    "task function did not run to completion"
                );
                Err(WorkerError::TaskPanicked {
                    task: task_name.to_string(),
                })
            }
        };

        let report = TaskReport {
            task: task_name.clone(),
            outcome,
        };
        if reports.send(report).await.is_err() {
            tracing::debug!(task = %task_name, "invocation already returned; result discarded");
        }
    }
}
