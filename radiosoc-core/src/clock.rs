//! Monotonic clock extending the 24-bit counter with a software overflow count

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::hal::{CounterPeripheral, HalError, InterruptController, InterruptLine, OscillatorSource};
use crate::types::{Tick, WideTick, COUNTER_BITS, COUNTER_MASK};

/// Wide, never decreasing tick count built from the hardware counter
///
/// The overflow count is written only by [`on_overflow_interrupt`] (and
/// [`reset_to_near_zero`]). Every other context reads it, so [`now_time`]
/// can combine the two halves without disabling interrupts.
///
/// [`on_overflow_interrupt`]: MonotonicClock::on_overflow_interrupt
/// [`reset_to_near_zero`]: MonotonicClock::reset_to_near_zero
/// [`now_time`]: MonotonicClock::now_time
pub struct MonotonicClock<P, O> {
    counter: P,
    oscillator: O,
    overflow_count: AtomicU32,
    started: AtomicBool,
}

impl<P, O> MonotonicClock<P, O>
where
    P: CounterPeripheral,
    O: OscillatorSource,
{
    /// Create a stopped clock
    pub const fn new(counter: P, oscillator: O) -> Self {
        Self {
            counter,
            oscillator,
            overflow_count: AtomicU32::new(0),
            started: AtomicBool::new(false),
        }
    }

    /// Start the oscillator and counter with the overflow interrupt enabled
    ///
    /// The counter is stopped before it is reconfigured; on nRF52 a counter
    /// that is started while still running does not restart cleanly.
    pub fn start<I: InterruptController>(&self, interrupts: &I) -> Result<(), HalError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(HalError::ClockAlreadyStarted);
        }

        self.overflow_count.store(0, Ordering::Release);

        if !self.oscillator.is_running() {
            self.oscillator.configure();
            self.oscillator.start();
        }

        self.counter.stop();
        self.counter.clear_overflow_event();
        self.counter.configure_overflow_interrupt();
        interrupts.enable(InterruptLine::Rtc);
        self.counter.start();

        #[cfg(feature = "defmt")]
        defmt::info!("⏱️ Long clock started");

        Ok(())
    }

    /// Zero the overflow count. The low 24 bits keep their hardware value.
    pub fn reset_to_near_zero(&self) {
        self.overflow_count.store(0, Ordering::Release);
    }

    /// Current wide tick count
    ///
    /// Reads the overflow count, the counter, then the overflow count again
    /// and retries if an overflow was serviced in between. A second overflow
    /// cannot happen within three register reads, so there is at most one
    /// retry per call.
    pub fn now_time(&self) -> WideTick {
        loop {
            let high = self.overflow_count.load(Ordering::Acquire);
            let low = self.counter.ticks() & COUNTER_MASK;
            if high == self.overflow_count.load(Ordering::Acquire) {
                return ((high as WideTick) << COUNTER_BITS) | low as WideTick;
            }
        }
    }

    /// Raw 24-bit counter value
    pub fn ticks(&self) -> Tick {
        self.counter.ticks() & COUNTER_MASK
    }

    /// Number of overflows since start or the last reset
    pub fn overflow_count(&self) -> u32 {
        self.overflow_count.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Check if the oscillator backing the counter is running
    pub fn is_oscillator_running(&self) -> bool {
        self.oscillator.is_running()
    }

    /// Overflow part of the shared counter interrupt
    ///
    /// Returns true if an overflow was pending and has been serviced.
    pub fn on_overflow_interrupt(&self) -> bool {
        if !self.counter.is_overflow_event() {
            return false;
        }
        // Single writer: only this handler increments
        self.overflow_count.fetch_add(1, Ordering::AcqRel);
        self.counter.clear_overflow_event();

        #[cfg(feature = "defmt")]
        defmt::trace!("counter overflow {}", self.overflow_count.load(Ordering::Relaxed));

        true
    }

    pub fn counter(&self) -> &P {
        &self.counter
    }

    pub fn oscillator(&self) -> &O {
        &self.oscillator
    }
}
