// Worker
pub const DEFAULT_WORKER_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_WORKER_NAME: &str = "producer";

// Demo pacing
pub const DEFAULT_WORKER_HOLD_MS: u64 = 3000;
