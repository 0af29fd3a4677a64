//! Tokio runtime management for synchronous operations

use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;

/// Get or create the runtime shared by every object_store-backed service
pub(crate) fn shared_runtime() -> std::io::Result<Arc<Runtime>> {
    static RUNTIME: Mutex<Option<Arc<Runtime>>> = Mutex::new(None);

    let mut slot = RUNTIME.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(runtime) = slot.as_ref() {
        return Ok(runtime.clone());
    }

    let runtime = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("blobfs-worker")
            .build()?,
    );
    *slot = Some(runtime.clone());
    Ok(runtime)
}

/// Drive `future` to completion on `runtime`, blocking the caller.
///
/// Callers that are themselves inside a Tokio runtime cannot block that
/// runtime's thread, so the future is driven from a scoped helper thread.
pub(crate) fn block_on<F>(runtime: &Runtime, future: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    if tokio::runtime::Handle::try_current().is_err() {
        return runtime.block_on(future);
    }

    std::thread::scope(|scope| {
        match scope.spawn(|| runtime.block_on(future)).join() {
            Ok(output) => output,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_is_shared() {
        let a = shared_runtime().unwrap();
        let b = shared_runtime().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_block_on_outside_runtime() {
        let runtime = shared_runtime().unwrap();
        assert_eq!(block_on(&runtime, async { 21 * 2 }), 42);
    }

    #[tokio::test]
    async fn test_block_on_inside_runtime() {
        let runtime = shared_runtime().unwrap();
        assert_eq!(block_on(&runtime, async { "ok" }), "ok");
    }
}
