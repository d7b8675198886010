use std::time::{Duration, Instant};

/// Default cadence of progress logging.
pub const LOG_EACH: Duration = Duration::from_secs(15);

/// Progress counters logged periodically while the sink runs.
#[derive(Debug)]
pub struct Stats {
    last_block: u64,
    last_block_hash: String,
    last_logged: Instant,
    log_each: Duration,
}

impl Stats {
    pub fn new(log_each: Duration) -> Self {
        Stats {
            last_block: 0,
            last_block_hash: String::new(),
            last_logged: Instant::now(),
            log_each,
        }
    }

    pub fn record_block(&mut self, number: u64, hash: &str) {
        self.last_block = number;
        self.last_block_hash = hash.to_string();
    }

    pub fn last_block(&self) -> u64 {
        self.last_block
    }

    pub fn last_block_hash(&self) -> &str {
        &self.last_block_hash
    }

    /// Logs progress when the cadence elapsed.
    pub fn maybe_log(&mut self) {
        if self.last_logged.elapsed() < self.log_each {
            return;
        }
        self.log_now();
        self.last_logged = Instant::now();
    }

    pub fn log_now(&self) {
        if self.last_block == 0 {
            tracing::info!("graphcsv sink got no blocks yet");
            return;
        }
        tracing::info!(last_block = self.last_block, "graphcsv sink stats");
    }
}

impl Default for Stats {
    fn default() -> Self {
        Stats::new(LOG_EACH)
    }
}
