//! Ring-buffer transport: the lock-free SPSC/SPMC handoff mechanism that
//! carries orders into the business-logic processor and carries events
//! out to the parallel output consumers.

mod buffer;
mod sequence;
mod wait_strategy;

pub use buffer::RingBuffer;
pub use wait_strategy::{BusySpinWaitStrategy, ParkingWaitStrategy, WaitStrategy, YieldingWaitStrategy};

use std::sync::Arc;

/// Build the configured [`WaitStrategy`] trait object from the `wait_strategy`
/// config option.
pub fn build_wait_strategy(name: &str) -> Arc<dyn WaitStrategy> {
    match name {
        "busy" => Arc::new(BusySpinWaitStrategy),
        "parking" => Arc::new(ParkingWaitStrategy::default()),
        _ => Arc::new(YieldingWaitStrategy::default()),
    }
}
