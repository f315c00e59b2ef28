use crate::opt::ConfigFile;
use refgate::constants::DEFAULT_WORKER_NAME;
use refgate::{Dispatcher, Error, Handler, Producer, Registration};
use std::thread;
use std::time::Duration;

struct Reading {
    value: u32,
}

/// A costlier representation of a [`Reading`], only built while something consumes it.
struct DetailedReading {
    value: u32,
    history: Vec<u32>,
}

impl From<&Reading> for DetailedReading {
    fn from(reading: &Reading) -> Self {
        Self {
            value: reading.value,
            history: (0..=reading.value).collect(),
        }
    }
}

struct Summary;

impl Handler<Reading> for Summary {
    fn execute(&self, data: &Reading) {
        log::info!("---- Summary handler got reading {}", data.value);
    }
}

struct Detail;

impl Handler<DetailedReading> for Detail {
    fn execute(&self, data: &DetailedReading) {
        log::info!(
            "---- Detail handler got reading {} with {} history entries",
            data.value,
            data.history.len()
        );
    }
}

pub fn dispatch() -> Result<(), Error> {
    let reading = Reading { value: 4 };
    let run = |dispatcher: &Dispatcher<Reading, DetailedReading>| {
        let report = dispatcher.dispatch(&reading);
        log::info!(
            "-- Dispatched to {} handlers (converted={})",
            report.executed,
            report.converted
        );
    };

    log::info!("Starting with two summary handlers");
    let mut dispatcher = Dispatcher::with_handlers([
        Registration::plain(Summary),
        Registration::plain(Summary),
    ]);
    run(&dispatcher);

    log::info!("Adding two detail handlers");
    let first = dispatcher.add(Registration::converted(Detail));
    let second = dispatcher.add(Registration::converted(Detail));
    run(&dispatcher);

    log::info!("Removing one detail handler");
    dispatcher.remove(first)?;
    run(&dispatcher);

    log::info!("Removing the other detail handler");
    dispatcher.remove(second)?;
    run(&dispatcher);

    log::info!("Re-adding a detail handler");
    dispatcher.add(Registration::converted(Detail));
    run(&dispatcher);

    Ok(())
}

pub fn worker(config: &ConfigFile) -> Result<(), Error> {
    let hold = Duration::from_millis(config.worker_hold_ms);
    let producer = Producer::new(
        DEFAULT_WORKER_NAME,
        Duration::from_millis(config.worker_interval_ms),
        || log::info!("-- Tick from producer worker"),
    );

    log::info!("*** Add and remove a single consumer ***");
    producer.add_consumer()?;
    thread::sleep(hold);
    producer.del_consumer()?;

    log::info!("*** Add and remove overlapping consumers ***");
    producer.add_consumer()?;
    thread::sleep(hold);
    producer.add_consumer()?;
    thread::sleep(hold);
    producer.del_consumer()?;
    thread::sleep(hold);
    producer.del_consumer()?;

    Ok(())
}
