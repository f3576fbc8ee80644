use crate::config::SendTarget;
use crate::log_info;

/// Read-only snapshot of a run's counters
#[derive(Debug, Clone)]
pub struct SpamStats {
    pub running: bool,
    pub initiated: u64,
    pub sent: u64,
    pub failed: u64,
    pub total_planned: SendTarget,
}

impl SpamStats {
    /// Success rate against the planned total, formatted to two decimals.
    ///
    /// The denominator is the planned total, not attempts resolved so far,
    /// so mid-run the figure under-reports. An unlimited run has no
    /// meaningful denominator and renders the infinity sentinel instead.
    pub fn success_rate(&self) -> String {
        match self.total_planned {
            SendTarget::Unbounded => "∞".to_string(),
            SendTarget::Bounded(0) => "0.00".to_string(),
            SendTarget::Bounded(total) => {
                format!("{:.2}", self.sent as f64 / total as f64 * 100.0)
            }
        }
    }
}

/// Final-report printer
pub struct StatsHandler;

impl StatsHandler {
    pub fn print_final_stats(stats: &SpamStats) {
        log_info!("");
        log_info!("📊 Final Statistics:");
        log_info!("  Attempts initiated: {}", stats.initiated);
        log_info!("  Sent: {}", stats.sent);
        log_info!("  Failed: {}", stats.failed);
        log_info!("  Total planned: {}", stats.total_planned);
        log_info!("  Success rate: {}%", stats.success_rate());
    }
}
