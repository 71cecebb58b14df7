use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
pub use tokio_util::sync::CancellationToken;

/// Multi-threaded Tokio runtime paired with the batch's cancellation token.
pub struct NoteWriterRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl NoteWriterRuntime {
    /// Build a runtime with `worker_threads` workers (at least one).
    ///
    /// ```
    /// use notewriter_runtime::NoteWriterRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = NoteWriterRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops the batch from dispatching new posts.
    ///
    /// ```
    /// use notewriter_runtime::NoteWriterRuntime;
    ///
    /// let runtime = NoteWriterRuntime::build("token-example", Some(1)).unwrap();
    /// assert!(!runtime.cancellation().is_cancelled());
    /// ```
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the token on the first Ctrl-C. In-flight work is left to finish.
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => {
                        tracing::warn!("runtime.ctrl_c.received");
                        cancel.cancel();
                    }
                    Err(e) => tracing::warn!(error = %e, "runtime.ctrl_c.unavailable"),
                },
            }
        });
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and shut the runtime down.
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}
