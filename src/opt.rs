use argh::FromArgs;
use refgate::constants::{DEFAULT_WORKER_HOLD_MS, DEFAULT_WORKER_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Use-counted resource gating demos.
#[derive(FromArgs)]
pub struct Cli {
    /// logging verbosity (-v debug -v -v trace)
    #[argh(switch, short = 'v')]
    pub verbose: u8,

    /// path to a JSON config file (created with defaults if missing)
    #[argh(option)]
    pub config: Option<PathBuf>,

    /// write logs to this file instead of stderr
    #[argh(option)]
    pub log_file: Option<PathBuf>,

    #[argh(subcommand)]
    pub demo: Demo,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum Demo {
    Dispatch(DispatchDemo),
    Worker(WorkerDemo),
}

/// Add and remove converting handlers, showing when the payload gets converted.
#[derive(FromArgs)]
#[argh(subcommand, name = "dispatch")]
pub struct DispatchDemo {}

/// Add and remove consumers, showing the producer worker start and stop.
#[derive(FromArgs)]
#[argh(subcommand, name = "worker")]
pub struct WorkerDemo {}

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Time the worker waits between units of work.
    pub worker_interval_ms: u64,
    /// Time each consumer is held in the worker demo.
    pub worker_hold_ms: u64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            worker_interval_ms: DEFAULT_WORKER_INTERVAL_MS,
            worker_hold_ms: DEFAULT_WORKER_HOLD_MS,
        }
    }
}
