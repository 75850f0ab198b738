use std::thread;

use shelvediff_host_api::Dispatcher;
use tracing::error;

/// Runs every job on a fresh named thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDispatcher;

impl Dispatcher for ThreadDispatcher {
    fn dispatch(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        let spawned = thread::Builder::new()
            .name("shelvediff-worker".into())
            .spawn(job);
        if let Err(err) = spawned {
            error!("failed to start worker thread: {err}");
        }
    }
}

/// Runs jobs synchronously on the calling thread.
///
/// Suited to command-line use where there is no UI thread to keep free.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        job();
    }
}
