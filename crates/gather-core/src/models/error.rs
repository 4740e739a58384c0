use crate::models::{TaskKind, WorkerMode};

/// Error produced by a task function. The executor never inspects it.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum WorkerErrorKind {
    ModeMismatch,
    UnsupportedTask,
    InvalidName,
    EmptyTaskSet,
    Cancelled,
    TaskPanicked,
    TaskFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("task '{task}' is a {attempted:?} task but the worker runs in {mode:?} mode")]
    ModeMismatch {
        task: String,
        mode: WorkerMode,
        attempted: TaskKind,
    },

    #[error("task '{task}' is neither a getter nor a sender")]
    UnsupportedTask { task: String },

    #[error("task name must not be empty")]
    InvalidName,

    #[error("no tasks are registered")]
    EmptyTaskSet,

    #[error("invocation was cancelled")]
    Cancelled,

    #[error("task '{task}' panicked or was aborted")]
    TaskPanicked { task: String },

    #[error(transparent)]
    TaskFailure(TaskError),
}

impl WorkerError {
    pub fn kind(&self) -> WorkerErrorKind {
        match self {
            Self::ModeMismatch { .. } => WorkerErrorKind::ModeMismatch,
            Self::UnsupportedTask { .. } => WorkerErrorKind::UnsupportedTask,
            Self::InvalidName => WorkerErrorKind::InvalidName,
            Self::EmptyTaskSet => WorkerErrorKind::EmptyTaskSet,
            Self::Cancelled => WorkerErrorKind::Cancelled,
            Self::TaskPanicked { .. } => WorkerErrorKind::TaskPanicked,
            Self::TaskFailure(_) => WorkerErrorKind::TaskFailure,
        }
    }

    /// Returns the error reported by the failing task, if this is a task failure.
    pub fn into_task_error(self) -> Option<TaskError> {
        match self {
            Self::TaskFailure(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_failure_displays_the_task_error_verbatim() {
        let error = WorkerError::TaskFailure("boom".into());
        assert_eq!(error.to_string(), "boom");
        assert_eq!(error.kind(), WorkerErrorKind::TaskFailure);
        assert_eq!(error.into_task_error().unwrap().to_string(), "boom");
    }

    #[test]
    fn mode_mismatch_names_both_kinds() {
        let error = WorkerError::ModeMismatch {
            task: "notify".to_string(),
            mode: WorkerMode::Getter,
            attempted: TaskKind::Sender,
        };
        assert_eq!(
            error.to_string(),
            "task 'notify' is a Sender task but the worker runs in Getter mode"
        );
        assert!(error.into_task_error().is_none());
    }
}
