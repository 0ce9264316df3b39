//! Relay statistics.

use std::time::Duration;

use observability::DeliveryStatsAggregator;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Per-payload delivery outcomes
    pub deliveries: DeliveryStatsAggregator,

    /// Payload sources that could not be read
    pub unreadable: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Cursor position when the run ended
    pub final_host: Option<String>,
}

impl RelayStats {
    /// Payloads handed to the relay, readable or not
    pub fn total(&self) -> u64 {
        self.deliveries.total() + self.unreadable
    }

    /// Payloads that no host accepted
    pub fn failed(&self) -> u64 {
        self.deliveries.undelivered() + self.unreadable
    }

    /// Delivered payloads per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.deliveries.delivered as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        print!("{}", self.deliveries.summary());
        println!("Unreadable: {}", self.unreadable);
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Throughput: {:.2} payloads/s", self.throughput());
        if let Some(host) = &self.final_host {
            println!("Next host: {}", host);
        }
        println!();
    }
}
