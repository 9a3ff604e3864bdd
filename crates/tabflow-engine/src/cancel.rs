use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation token.
///
/// Tokens form a chain: a child is cancelled when its own flag or any
/// ancestor's flag is raised. The engine hands each task a child of the
/// run token, so aborting the run reaches every in-flight task while a
/// per-task timeout cancels only its own task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    parent: Option<Arc<Inner>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled by either its own [`cancel`](Self::cancel) or this
    /// token's.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                parent: Some(Arc::clone(&self.inner)),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(&self.inner);
        while let Some(inner) = current {
            if inner.flag.load(Ordering::SeqCst) {
                return true;
            }
            current = inner.parent.as_ref();
        }
        false
    }
}
