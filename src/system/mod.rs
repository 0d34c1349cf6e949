//! System utilities and monitoring
//!
//! Request metrics for the client and health reporting for the emulator.

pub mod metrics;

pub mod health {
    //! Health reporting
    use serde::{Deserialize, Serialize};
    use std::time::Instant;

    /// Health status served by the emulator
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct HealthStatus {
        /// Overall service status
        pub status: ServiceStatus,
        /// Uptime in seconds
        pub uptime: u64,
        /// Crate version
        pub version: String,
        /// Nodes currently stored
        pub nodes: usize,
        /// Edges currently stored
        pub edges: usize,
    }

    /// Service health levels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ServiceStatus {
        /// Operating normally
        Healthy,
        /// Operating with problems
        Degraded,
    }

    /// Tracks process start for uptime reporting
    #[derive(Debug, Clone)]
    pub struct HealthChecker {
        started: Instant,
    }

    impl HealthChecker {
        /// Start the uptime clock now
        pub fn new() -> Self {
            Self {
                started: Instant::now(),
            }
        }

        /// Build a status report for the given store sizes
        pub fn check(&self, nodes: usize, edges: usize) -> HealthStatus {
            HealthStatus {
                status: ServiceStatus::Healthy,
                uptime: self.started.elapsed().as_secs(),
                version: crate::VERSION.to_string(),
                nodes,
                edges,
            }
        }
    }

    impl Default for HealthChecker {
        fn default() -> Self {
            Self::new()
        }
    }
}
