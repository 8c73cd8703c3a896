use std::future::Future;
use std::sync::Once;
use std::time::Duration;

static LOGGER_INIT: Once = Once::new();

pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Fire-and-forget task on the current tokio runtime.
///
/// Returns `false` (and drops the task) when called outside a runtime, e.g.
/// from a timer callback on a headless host driven by `ManualTimer`.
pub fn spawn<F>(fut: F) -> bool
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fut);
            true
        }
        Err(e) => {
            log::warn!("[platform] no tokio runtime, background task dropped: {e}");
            false
        }
    }
}

/// Installs `env_logger`; `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: log::Level) {
    LOGGER_INIT.call_once(|| {
        let default = level.as_str().to_ascii_lowercase();
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
            .format_timestamp_millis()
            .try_init();
    });
}

/// Native panics already print to stderr.
pub fn install_panic_hook() {}
