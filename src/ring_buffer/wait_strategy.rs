//! Wait strategies for ring-buffer producers and consumers.
//!
//! Every variant observes progress purely through memory-ordered atomic
//! loads in the ring buffer itself; none acquires a lock while waiting.

use std::time::Duration;

/// Policy applied on each failed attempt to claim or consume a sequence.
/// `attempt` is the number of prior failed attempts for the *current*
/// operation, so implementations can escalate from spinning to yielding
/// to parking.
pub trait WaitStrategy: Send + Sync {
    fn wait(&self, attempt: u64);
}

/// Pure busy-spin. Lowest latency, burns a full core while waiting.
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl WaitStrategy for BusySpinWaitStrategy {
    #[inline]
    fn wait(&self, _attempt: u64) {
        std::hint::spin_loop();
    }
}

/// Busy-spin for a bounded count, then cooperative yield, then a brief
/// park. The default per the configuration options (§6).
#[derive(Debug)]
pub struct YieldingWaitStrategy {
    spin_attempts: u64,
    yield_attempts: u64,
    park_timeout: Duration,
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self {
            spin_attempts: 100,
            yield_attempts: 1_000,
            park_timeout: Duration::from_micros(50),
        }
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait(&self, attempt: u64) {
        if attempt < self.spin_attempts {
            std::hint::spin_loop();
        } else if attempt < self.yield_attempts {
            std::thread::yield_now();
        } else {
            std::thread::park_timeout(self.park_timeout);
        }
    }
}

/// Parks immediately with a timeout on every attempt. Highest latency,
/// lowest CPU usage; suited to low-throughput or power-sensitive deployments.
#[derive(Debug)]
pub struct ParkingWaitStrategy {
    timeout: Duration,
}

impl Default for ParkingWaitStrategy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1),
        }
    }
}

impl WaitStrategy for ParkingWaitStrategy {
    fn wait(&self, _attempt: u64) {
        std::thread::park_timeout(self.timeout);
    }
}
