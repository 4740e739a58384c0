mod admission;
pub mod context;
pub mod worker;

pub use crate::task_context::current_task_name;
pub use context::TaskContext;
pub use worker::Worker;

use crate::models::WorkerError;

pub type WorkerResult<T> = Result<T, WorkerError>;
