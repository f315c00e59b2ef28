use crate::error::Error;
use crate::refcount::Refcounter;
use crate::worker::Worker;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Work = Arc<dyn Fn() + Send + Sync>;

/// Runs a background worker for as long as it has at least one consumer.
///
/// The first consumer starts the worker; the last one to leave stops it and waits for it to exit.
/// Teardown is driven by [`Refcounter::decrement_and_test`], since joining the worker needs
/// state owned by the producer.
pub struct Producer {
    name: String,
    interval: Duration,
    work: Work,
    consumers: Refcounter,
    /// Held by every consumer change, so starts and stops never interleave.
    /// While it is released, a nonzero count always has a worker in the slot.
    worker: Mutex<Option<Worker>>,
    spawn: fn(&str, Duration, Work) -> io::Result<Worker>,
}

impl Producer {
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        work: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            interval,
            work: Arc::new(work),
            consumers: Refcounter::new(0),
            worker: Mutex::new(None),
            spawn: spawn_worker,
        }
    }

    /// Add a consumer, starting the worker if it is not running.
    ///
    /// A worker that exited on its own (its unit of work panicked) is replaced.
    /// If the worker cannot be started, the consumer is not added.
    pub fn add_consumer(&self) -> Result<(), Error> {
        let mut worker = self.lock_worker();

        log::debug!(
            "Adding consumer to `{}` (consumers before: {})",
            self.name,
            self.consumers.count()
        );

        if !worker.as_ref().is_some_and(|w| !w.is_finished()) {
            if let Some(dead) = worker.take() {
                log::warn!("Worker for `{}` exited on its own, restarting", self.name);
                dead.stop();
            }

            log::info!("Starting worker for `{}`", self.name);
            match (self.spawn)(&self.name, self.interval, self.work.clone()) {
                Ok(started) => *worker = Some(started),
                Err(e) => {
                    log::error!("Failed to start worker for `{}`: {e}", self.name);
                    return Err(Error::Spawn(e));
                }
            }
        }

        if !self.consumers.increment_if_nonzero() {
            self.consumers.increment();
        }

        Ok(())
    }

    pub fn del_consumer(&self) -> Result<(), Error> {
        log::debug!(
            "Deleting consumer from `{}` (consumers before: {})",
            self.name,
            self.consumers.count()
        );

        let mut worker = self.lock_worker();

        if self.consumers.decrement_and_test()? {
            log::info!("All consumers of `{}` have exited, stopping worker", self.name);
            if let Some(worker) = worker.take() {
                worker.stop();
            }
        }

        Ok(())
    }

    pub fn consumers(&self) -> usize {
        self.consumers.count()
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker().as_ref().is_some_and(|w| !w.is_finished())
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn spawn_worker(name: &str, interval: Duration, work: Work) -> io::Result<Worker> {
    Worker::spawn(name, interval, move || work())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refcount::Underflow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    fn producer() -> (Arc<AtomicUsize>, Producer) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let producer = Producer::new("test-producer", Duration::from_millis(1), {
            let ticks = ticks.clone();
            move || {
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        });
        (ticks, producer)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn idle_until_first_consumer() {
        let (ticks, producer) = producer();
        assert!(!producer.is_running());
        assert_eq!(producer.consumers(), 0);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn single_consumer_starts_and_stops_worker() {
        let (ticks, producer) = producer();

        producer.add_consumer().unwrap();
        assert!(producer.is_running());
        assert_eq!(producer.consumers(), 1);
        wait_for(|| ticks.load(Ordering::SeqCst) >= 2);

        producer.del_consumer().unwrap();
        assert!(!producer.is_running());
        assert_eq!(producer.consumers(), 0);

        let stopped_at = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), stopped_at);
    }

    #[test]
    fn overlapping_consumers_share_one_worker() {
        let (_, producer) = producer();

        producer.add_consumer().unwrap();
        producer.add_consumer().unwrap();
        assert_eq!(producer.consumers(), 2);

        producer.del_consumer().unwrap();
        assert!(producer.is_running());
        assert_eq!(producer.consumers(), 1);

        producer.del_consumer().unwrap();
        assert!(!producer.is_running());
    }

    #[test]
    fn restarts_after_last_consumer_leaves() {
        let (ticks, producer) = producer();

        producer.add_consumer().unwrap();
        producer.del_consumer().unwrap();
        let stopped_at = ticks.load(Ordering::SeqCst);

        producer.add_consumer().unwrap();
        assert!(producer.is_running());
        wait_for(|| ticks.load(Ordering::SeqCst) > stopped_at);
        producer.del_consumer().unwrap();
    }

    #[test]
    fn del_without_consumer_underflows() {
        let (_, producer) = producer();
        assert!(matches!(
            producer.del_consumer(),
            Err(Error::Underflow(Underflow))
        ));
        assert_eq!(producer.consumers(), 0);
        assert!(!producer.is_running());
    }

    #[test]
    fn racing_first_consumers_start_one_worker() {
        let starts = Arc::new(AtomicUsize::new(0));
        let producer = Producer::new("test-race", Duration::from_secs(3600), {
            let starts = starts.clone();
            // With an hour-long interval, each worker runs its unit exactly once.
            move || {
                starts.fetch_add(1, Ordering::SeqCst);
            }
        });

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| producer.add_consumer().unwrap());
            }
        });
        assert_eq!(producer.consumers(), 8);
        wait_for(|| starts.load(Ordering::SeqCst) >= 1);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| producer.del_consumer().unwrap());
            }
        });
        assert!(!producer.is_running());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn churn_leaves_no_worker() {
        let (_, producer) = producer();
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        producer.add_consumer().unwrap();
                        producer.del_consumer().unwrap();
                    }
                });
            }
        });
        assert_eq!(producer.consumers(), 0);
        assert!(!producer.is_running());
    }

    #[test]
    fn drop_stops_running_worker() {
        let (ticks, producer) = producer();
        producer.add_consumer().unwrap();
        wait_for(|| ticks.load(Ordering::SeqCst) >= 1);
        drop(producer);

        let stopped_at = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), stopped_at);
    }

    #[test]
    fn failed_start_adds_no_consumer() {
        let (ticks, mut producer) = producer();
        producer.spawn = |_, _, _| Err(io::Error::other("thread limit reached"));

        assert!(matches!(producer.add_consumer(), Err(Error::Spawn(_))));
        assert_eq!(producer.consumers(), 0);
        assert!(!producer.is_running());
        assert!(matches!(
            producer.del_consumer(),
            Err(Error::Underflow(Underflow))
        ));

        producer.spawn = spawn_worker;
        producer.add_consumer().unwrap();
        assert_eq!(producer.consumers(), 1);
        wait_for(|| ticks.load(Ordering::SeqCst) >= 1);
        producer.del_consumer().unwrap();
    }

    #[test]
    fn racing_consumers_during_failed_start() {
        let (_, mut producer) = producer();
        producer.spawn = |_, _, _| Err(io::Error::other("thread limit reached"));

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| assert!(producer.add_consumer().is_err()));
            }
        });
        assert_eq!(producer.consumers(), 0);
        assert!(!producer.is_running());
    }

    #[test]
    fn dead_worker_is_replaced() {
        let units = Arc::new(AtomicUsize::new(0));
        let producer = Producer::new("test-dead", Duration::from_millis(1), {
            let units = units.clone();
            move || {
                if units.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first unit fails");
                }
            }
        });

        producer.add_consumer().unwrap();
        wait_for(|| !producer.is_running());
        assert_eq!(producer.consumers(), 1);
        assert_eq!(units.load(Ordering::SeqCst), 1);

        producer.add_consumer().unwrap();
        assert_eq!(producer.consumers(), 2);
        assert!(producer.is_running());
        wait_for(|| units.load(Ordering::SeqCst) >= 3);

        producer.del_consumer().unwrap();
        producer.del_consumer().unwrap();
        assert!(!producer.is_running());
    }
}
