//! Retention settings.

use std::time::Duration;

/// Retention policy for the cleanup scheduler.
///
/// Event retention and node-inactivity cleanup are independent sub-passes;
/// either can be disabled on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    pub event_cleanup_enabled: bool,
    /// Event rows older than this are deleted.
    pub retention_days: u32,
    pub node_cleanup_enabled: bool,
    /// Nodes not seen for this long are deleted.
    pub node_inactivity_days: u32,
    /// Minimum time between two completed passes.
    pub interval: Duration,
    /// How often the scheduler wakes up to check whether a pass is due.
    pub check_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            event_cleanup_enabled: true,
            retention_days: 30,
            node_cleanup_enabled: false,
            node_inactivity_days: 90,
            interval: Duration::from_secs(24 * 60 * 60),
            check_interval: Duration::from_secs(60 * 60),
        }
    }
}
