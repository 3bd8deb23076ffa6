use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace};

/// A repeating task on its own thread. The task owns its stop channel:
/// once `cancel` returns no further tick starts, and dropping the task
/// cancels it.
pub struct ScheduledTask {
    name: String,
    stop_tx: Option<Sender<()>>,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Runs `tick` right away, then every `interval` until cancelled.
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!("{thread_name} started (every {interval:?})");
                let mut ticks = 0u64;
                loop {
                    if flag.load(Ordering::SeqCst) {
                        break;
                    }
                    ticks += 1;
                    trace!("{thread_name} tick {ticks}");
                    tick();
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("{thread_name} stopped after {ticks} ticks");
            })?;
        Ok(Self {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            stopped,
            handle: Some(handle),
        })
    }

    pub fn is_active(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// Stops future ticks without waiting for a tick in progress.
    pub fn cancel(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
            debug!("{} cancelled", self.name);
        }
        self.handle.take();
    }

    /// Stops future ticks and waits for the thread to finish.
    pub fn shutdown(mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
