use crate::sys_utils::config_loader::{DEFAULT_CONFIG, RuntimeParams};
use log::info;
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};
use tokio::runtime::Runtime as TokioRuntime;
use tokio::runtime::{Builder as TokioBuilder, Runtime};

static GLOBAL_TOKIO_RUNTIME: Lazy<RwLock<Option<Arc<TokioRuntime>>>> =
    Lazy::new(|| RwLock::new(None));

/// Returns the runtime shared by every provider actor, building it on first use from the
/// `runtime` section of the process-wide configuration.
pub fn get_or_init_tokio_runtime() -> Arc<TokioRuntime> {
    {
        let registry = GLOBAL_TOKIO_RUNTIME
            .read()
            .expect("GLOBAL_TOKIO_RUNTIME not initialized");
        if let Some(runtime) = registry.as_ref() {
            return runtime.clone();
        }
    }

    let mut registry = GLOBAL_TOKIO_RUNTIME
        .write()
        .expect("Global Tokio Runtime unavailable");
    // another caller may have built it while we waited for the lock
    if let Some(runtime) = registry.as_ref() {
        return runtime.clone();
    }

    let params: &RuntimeParams = DEFAULT_CONFIG.get_runtime_params();
    let worker_threads: usize = params.worker_threads.unwrap_or_else(default_worker_threads);

    let runtime_multi_thread: Arc<Runtime> = Arc::new(
        TokioBuilder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name(params.thread_name.clone())
            .enable_all()
            .build()
            .expect("Unable to create tokio runtime"),
    );
    info!(
        "[TokioUtils - get_or_init_tokio_runtime] Started runtime with {} worker threads",
        worker_threads
    );
    *registry = Some(runtime_multi_thread.clone());
    runtime_multi_thread
}

/// One less than the core count to leave the caller's thread free, but at least one.
fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|cores| cores.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_is_shared() {
        let first = get_or_init_tokio_runtime();
        let second = get_or_init_tokio_runtime();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.block_on(async { 1 + 1 }), 2);
    }

    #[test]
    fn at_least_one_worker() {
        assert!(default_worker_threads() >= 1);
    }
}
