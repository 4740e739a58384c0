use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};

/// Cooperative cancellation handle shared by an invocation and its tasks.
///
/// Cancellation only stops work that has not started yet. A task function that
/// is already running keeps going unless it watches its own context.
#[derive(Clone, Debug, Default)]
pub struct TaskContext {
    inner: Arc<ContextState>,
}

#[derive(Debug, Default)]
struct ContextState {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
    children: Mutex<Vec<Weak<ContextState>>>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(ContextState {
                deadline: Some(deadline),
                ..ContextState::default()
            }),
        }
    }

    /// Derives a context that is cancelled together with `self`.
    pub fn child(&self) -> Self {
        self.derive(self.inner.deadline)
    }

    /// Like [`TaskContext::child`], but also expires after `timeout`.
    /// The parent's deadline still applies when it is earlier.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) => parent.min(own),
            None => own,
        };
        self.derive(Some(deadline))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn cancel(&self) {
        cancel_state(&self.inner);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Completes once the context is cancelled or its deadline has passed.
    pub async fn cancelled(&self) {
        loop {
            let mut notified = pin!(self.inner.notify.notified());
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }

            match self.inner.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = sleep_until(deadline) => return,
                    }
                }
                None => notified.await,
            }
        }
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let child = Arc::new(ContextState {
            deadline,
            ..ContextState::default()
        });

        let mut children = lock_children(&self.inner);
        if self.inner.cancelled.load(Ordering::SeqCst) {
            child.cancelled.store(true, Ordering::SeqCst);
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }

        Self { inner: child }
    }
}

impl ContextState {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

fn cancel_state(state: &Arc<ContextState>) {
    if state.cancelled.swap(true, Ordering::SeqCst) {
        return;
    }
    state.notify.notify_waiters();

    let children = std::mem::take(&mut *lock_children(state));
    for child in children.iter().filter_map(Weak::upgrade) {
        cancel_state(&child);
    }
}

fn lock_children(state: &ContextState) -> std::sync::MutexGuard<'_, Vec<Weak<ContextState>>> {
    // The list only holds weak handles, so a poisoned lock still has usable contents.
    state
        .children
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
