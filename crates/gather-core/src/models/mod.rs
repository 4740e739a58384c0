pub mod error;
pub mod task;

pub use error::{TaskError, WorkerError, WorkerErrorKind};
pub use task::{GetterFn, SenderFn, Task, TaskFuture, TaskKind, WorkerMode};
