use crate::panic::handle_unwind;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::panic::AssertUnwindSafe;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A background thread that repeatedly runs a unit of work until stopped.
///
/// Stopping is cooperative: the thread checks for the stop signal once per iteration,
/// between units of work, and exits without starting another unit.
pub struct Worker {
    name: String,
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start a thread that calls `work`, then waits up to `interval` for a stop signal, in a loop.
    pub fn spawn(
        name: impl Into<String>,
        interval: Duration,
        work: impl FnMut() + Send + 'static,
    ) -> io::Result<Self> {
        let name = name.into();
        let (stop, stopped) = channel::bounded(1);

        let thread = thread::Builder::new().name(name.clone()).spawn({
            let name = name.clone();
            move || run(&name, interval, work, &stopped)
        })?;

        log::debug!("Started worker `{name}` (interval={interval:?})");

        Ok(Self {
            name,
            stop,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread has exited on its own, e.g. because a unit of work panicked.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signal the thread to stop and block until it has exited.
    pub fn stop(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        log::debug!("Stopping worker `{}`", self.name);

        // Fails only if the thread already exited and dropped the receiver.
        _ = self.stop.send(());

        match thread.join() {
            Ok(()) => log::debug!("Joined worker `{}`", self.name),
            Err(_) => log::error!("Worker `{}` panicked outside of its work loop", self.name),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run(name: &str, interval: Duration, mut work: impl FnMut(), stopped: &Receiver<()>) {
    loop {
        if handle_unwind(name, AssertUnwindSafe(&mut work)).is_none() {
            break;
        }

        match stopped.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::trace!("Worker `{name}` exiting");
}
