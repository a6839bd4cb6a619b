#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # radiosoc core
//!
//! Clock, timer and sleep core for battery powered radio SoCs.
//! A free-running 24-bit counter is extended into a wide monotonic clock,
//! its compare channels back a few one-shot timers, and a sleeper halts the
//! CPU until a timeout or an event such as a received message.

pub mod types;
pub mod hal;
pub mod clock;
pub mod timer;
pub mod dispatch;
pub mod sleeper;
pub mod facilitator;
pub mod delay;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;


pub use types::*;
pub use hal::*;
pub use clock::MonotonicClock;
pub use timer::{compare_target, TimerHandler, TimerService};
pub use dispatch::{InterruptSource, RtcInterrupt, Serviced, SERVICE_ORDER};
pub use sleeper::{arbitrate, Arbitration, ReasonForWake, Sleeper};
pub use delay::LowPowerDelay;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of timer slots on the usual 3-channel counter
pub const TIMER_SLOTS: usize = 3;

/// Sleeper configuration allowing every timeout the counter can express
pub fn default_sleeper_config() -> SleeperConfig {
    SleeperConfig::default()
}
