use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::models::TaskError;
use crate::orchestration::TaskContext;

pub type TaskFuture<T> = Pin<Box<dyn Future<Output = Result<T, TaskError>> + Send>>;

/// Produces a value from the invocation context and its argument.
pub type GetterFn<A, V> = Arc<dyn Fn(TaskContext, A) -> TaskFuture<V> + Send + Sync>;

/// Performs a side effect and only reports success or failure.
pub type SenderFn<A> = Arc<dyn Fn(TaskContext, A) -> TaskFuture<()> + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TaskKind {
    Getter,
    Sender,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum WorkerMode {
    #[default]
    Unset,
    Getter,
    Sender,
}

impl WorkerMode {
    pub fn accepts(self, kind: TaskKind) -> bool {
        matches!(
            (self, kind),
            (WorkerMode::Unset, _)
                | (WorkerMode::Getter, TaskKind::Getter)
                | (WorkerMode::Sender, TaskKind::Sender)
        )
    }
}

impl From<TaskKind> for WorkerMode {
    fn from(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Getter => WorkerMode::Getter,
            TaskKind::Sender => WorkerMode::Sender,
        }
    }
}

pub enum Task<A, V> {
    Getter(GetterFn<A, V>),
    /// The second field produces the value recorded when the sender succeeds.
    Sender(SenderFn<A>, fn() -> V),
}

impl<A, V> Task<A, V>
where
    A: Send + 'static,
    V: Send + 'static,
{
    pub fn getter<F, Fut>(operation: F) -> Self
    where
        F: Fn(TaskContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
    {
        Task::Getter(Arc::new(move |context: TaskContext, argument: A| {
            Box::pin(operation(context, argument)) as TaskFuture<V>
        }))
    }

    /// Builds a sender. A successful run records `false`, meaning "did not fail".
    pub fn sender<F, Fut>(operation: F) -> Self
    where
        F: Fn(TaskContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
        V: From<bool>,
    {
        Task::Sender(
            Arc::new(move |context: TaskContext, argument: A| {
                Box::pin(operation(context, argument)) as TaskFuture<()>
            }),
            not_failed::<V>,
        )
    }

    pub(crate) fn call(&self, context: TaskContext, argument: A) -> TaskFuture<V> {
        match self {
            Task::Getter(operation) => operation(context, argument),
            Task::Sender(operation, delivered) => {
                let pending = operation(context, argument);
                let delivered = *delivered;
                Box::pin(async move { pending.await.map(|()| delivered()) })
            }
        }
    }
}

impl<A, V> Task<A, V> {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Getter(_) => TaskKind::Getter,
            Task::Sender(..) => TaskKind::Sender,
        }
    }
}

fn not_failed<V: From<bool>>() -> V {
    V::from(false)
}

impl<A, V> Clone for Task<A, V> {
    fn clone(&self) -> Self {
        match self {
            Task::Getter(operation) => Task::Getter(operation.clone()),
            Task::Sender(operation, delivered) => Task::Sender(operation.clone(), *delivered),
        }
    }
}

impl<A, V> Debug for Task<A, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task::{:?}(..)", self.kind())
    }
}
