//! Shared fixtures

use radiosoc_core::{OscillatorSource, WideTick, COUNTER_BITS};

/// Oscillator that is always running and has no state
///
/// Unlike the `Cell` based mock it is `Sync`, so a clock built on it can
/// be shared with a thread playing the interrupt handler.
#[derive(Copy, Clone, Debug, Default)]
pub struct RunningOscillator;

impl OscillatorSource for RunningOscillator {
    fn configure(&self) {}

    fn start(&self) {}

    fn is_running(&self) -> bool {
        true
    }

    fn enable_started_interrupt(&self) {}

    fn disable_started_interrupt(&self) {}
}

/// Compose a wide tick from an overflow count and a counter value
pub fn wide(overflows: u32, low: u32) -> WideTick {
    ((overflows as WideTick) << COUNTER_BITS) | low as WideTick
}
