use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT_TASK_NAME: Arc<str>;
}

/// Name the running task function was registered under.
///
/// Returns `None` outside of a task started by a [`crate::orchestration::Worker`].
pub fn current_task_name() -> Option<String> {
    CURRENT_TASK_NAME.try_with(|name| name.to_string()).ok()
}

pub(crate) async fn with_task_name<F: Future>(name: Arc<str>, operation: F) -> F::Output {
    CURRENT_TASK_NAME.scope(name, operation).await
}
