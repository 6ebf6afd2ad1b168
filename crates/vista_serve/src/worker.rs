//! Owned worker execution context
//!
//! A dedicated thread drives a single-threaded tokio runtime for one
//! running host. Callers submit futures through the runtime handle and
//! receive results over a channel, which works both for callers without a
//! scheduler of their own and for callers already inside one. Teardown
//! signals the loop, drops the runtime (cancelling anything still pending),
//! and joins the thread.

use std::future::Future;
use std::thread;

use tokio::runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::ServeError;

pub(crate) struct Worker {
    handle: runtime::Handle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub fn spawn() -> Result<Self, std::io::Error> {
        let rt = runtime::Builder::new_current_thread().enable_all().build()?;
        let handle = rt.handle().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<()>(1);

        let thread = thread::Builder::new()
            .name("vista-worker".to_owned())
            .spawn(move || {
                rt.block_on(async move {
                    let _ = ready_tx.send(());
                    // Parked until shutdown; spawned tasks run meanwhile.
                    let _ = shutdown_rx.await;
                });
            })?;

        // The handle accepts work as soon as the loop is live.
        let _ = ready_rx.recv();
        Ok(Self {
            handle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> runtime::Handle {
        self.handle.clone()
    }

    /// Run a future on the worker, blocking the calling thread on its result.
    pub fn run<T, F>(&self, future: F) -> Result<T, ServeError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = std::sync::mpsc::channel();
        self.handle.spawn(async move {
            let _ = tx.send(future.await);
        });
        rx.recv().map_err(|_| ServeError::WorkerGone)
    }

    /// Spawn a supervised background task on the worker.
    pub fn spawn_task<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Stop the loop and join the thread. Pending tasks are cancelled by
    /// the runtime drop.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.teardown();
    }
}
