//! Hardware Abstraction Layer for the counter, compare channels and sleep
//!
//! All trait methods take `&self`: the peripherals are shared between the
//! main flow and the interrupt handler and are driven through their
//! registers, not through owned state.

use crate::types::{Tick, TimerSlot};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// Timeout outside the range a compare channel can serve
    TimeoutOutOfRange { timeout: Tick },
    /// Slot already has a pending callback
    TimerAlreadyStarted(TimerSlot),
    /// Slot has no compare channel behind it
    InvalidSlot(TimerSlot),
    /// Monotonic clock was started twice
    ClockAlreadyStarted,
    /// Oscillator start requested while it is running
    OscillatorAlreadyRunning,
    /// Sleep timer expired again before the previous expiry was consumed
    WakeReasonOverrun,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::TimeoutOutOfRange { timeout } => {
                write!(f, "Timeout of {} ticks is out of range", timeout)
            }
            HalError::TimerAlreadyStarted(slot) => write!(f, "Timer {:?} already started", slot),
            HalError::InvalidSlot(slot) => write!(f, "Timer {:?} has no compare channel", slot),
            HalError::ClockAlreadyStarted => write!(f, "Clock already started"),
            HalError::OscillatorAlreadyRunning => write!(f, "Oscillator already running"),
            HalError::WakeReasonOverrun => write!(f, "Sleep timer expiry overran an unconsumed wake reason"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Free-running 24-bit tick counter
pub trait CounterPeripheral {
    /// Start counting. The first tick may not have happened on return.
    fn start(&self);

    /// Stop counting
    fn stop(&self);

    /// Current raw counter value, only the low 24 bits are valid
    fn ticks(&self) -> Tick;

    /// Check if the overflow event is pending
    fn is_overflow_event(&self) -> bool;

    /// Clear the overflow event. The clear is visible to the device on return.
    fn clear_overflow_event(&self);

    /// Route the overflow event to the counter's interrupt
    fn configure_overflow_interrupt(&self);
}

/// One hardware compare register of the counter
///
/// A match is not guaranteed when the target is within
/// [`MIN_TIMEOUT`](crate::types::MIN_TIMEOUT) ticks of the current count.
pub trait CompareChannel {
    /// Write the alarm value, only the low 24 bits are used
    fn set(&self, target: Tick);

    /// Enable the match interrupt
    fn enable_interrupt(&self);

    /// Disable the match interrupt
    fn disable_interrupt(&self);

    /// Clear the match event. The clear is visible to the device on return.
    fn clear_event(&self);

    /// Check if the match event is pending
    fn is_event(&self) -> bool;

    /// Disable first, then clear, so a match in between does not retrigger
    fn disable_interrupt_and_clear_event(&self) {
        self.disable_interrupt();
        self.clear_event();
    }
}

/// Oscillator backing a clock domain
pub trait OscillatorSource {
    /// Select the physical source
    fn configure(&self);

    /// Start the oscillator. Running is reported later.
    fn start(&self);

    /// Check if the oscillator reports stable
    fn is_running(&self) -> bool;

    /// Interrupt when the oscillator reports started
    fn enable_started_interrupt(&self);

    /// Stop interrupting on started
    fn disable_started_interrupt(&self);
}

/// Interrupt lines used by this subsystem
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptLine {
    /// Counter overflow and compare matches
    Rtc,
    /// Oscillator started and power-fail warning
    PowerClock,
    /// Radio end of packet
    Radio,
}

/// Interrupt controller
pub trait InterruptController {
    /// Clear any pending request, then enable the line
    fn enable(&self, line: InterruptLine);

    /// Disable the line
    fn disable(&self, line: InterruptLine);

    /// Drop a pending request
    fn clear_pending(&self, line: InterruptLine);
}

/// The processor's low-power wait
pub trait Mcu {
    /// Halt until an interrupt has been taken. May return spuriously.
    fn wait_for_interrupt(&self);
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use core::cell::{Cell, RefCell};
    use heapless::Vec;
    use portable_atomic::{AtomicBool, AtomicU32, Ordering};

    /// Oscillator that starts immediately or on demand
    ///
    /// Atomic so timer handlers that reach the clock stay `Sync`.
    #[derive(Default)]
    pub struct MockOscillator {
        configured: AtomicBool,
        started: AtomicBool,
        running: AtomicBool,
        start_instantly: AtomicBool,
        started_interrupt: AtomicBool,
        start_count: AtomicU32,
    }

    impl MockOscillator {
        pub fn new() -> Self {
            Self::default()
        }

        /// Oscillator that is running as soon as it is started
        pub fn instant() -> Self {
            let osc = Self::default();
            osc.start_instantly.store(true, Ordering::Relaxed);
            osc
        }

        /// Mark as running, as the started interrupt would
        pub fn set_running(&self, running: bool) {
            self.running.store(running, Ordering::Release);
        }

        pub fn is_configured(&self) -> bool {
            self.configured.load(Ordering::Acquire)
        }

        pub fn is_started(&self) -> bool {
            self.started.load(Ordering::Acquire)
        }

        pub fn start_count(&self) -> u32 {
            self.start_count.load(Ordering::Acquire)
        }

        pub fn started_interrupt_enabled(&self) -> bool {
            self.started_interrupt.load(Ordering::Acquire)
        }
    }

    impl OscillatorSource for MockOscillator {
        fn configure(&self) {
            self.configured.store(true, Ordering::Release);
        }

        fn start(&self) {
            self.started.store(true, Ordering::Release);
            self.start_count.fetch_add(1, Ordering::AcqRel);
            if self.start_instantly.load(Ordering::Acquire) {
                self.running.store(true, Ordering::Release);
            }
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::Acquire)
        }

        fn enable_started_interrupt(&self) {
            self.started_interrupt.store(true, Ordering::Release);
        }

        fn disable_started_interrupt(&self) {
            self.started_interrupt.store(false, Ordering::Release);
        }
    }

    /// Operation recorded by [`MockInterruptController`]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum InterruptOp {
        Enable(InterruptLine),
        Disable(InterruptLine),
        ClearPending(InterruptLine),
    }

    /// Interrupt controller that records every call
    #[derive(Default)]
    pub struct MockInterruptController {
        ops: RefCell<Vec<InterruptOp, 16>>,
    }

    impl MockInterruptController {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ops(&self) -> Vec<InterruptOp, 16> {
            self.ops.borrow().clone()
        }

        pub fn is_enabled(&self, line: InterruptLine) -> bool {
            let ops = self.ops.borrow();
            let last = ops.iter().rev().find(|op| match op {
                InterruptOp::Enable(l) | InterruptOp::Disable(l) => *l == line,
                InterruptOp::ClearPending(_) => false,
            });
            matches!(last, Some(InterruptOp::Enable(_)))
        }

        fn record(&self, op: InterruptOp) {
            // Oldest entries are dropped once full
            let mut ops = self.ops.borrow_mut();
            if ops.is_full() {
                ops.remove(0);
            }
            let _ = ops.push(op);
        }
    }

    impl InterruptController for MockInterruptController {
        fn enable(&self, line: InterruptLine) {
            self.record(InterruptOp::ClearPending(line));
            self.record(InterruptOp::Enable(line));
        }

        fn disable(&self, line: InterruptLine) {
            self.record(InterruptOp::Disable(line));
        }

        fn clear_pending(&self, line: InterruptLine) {
            self.record(InterruptOp::ClearPending(line));
        }
    }

    /// MCU whose halt runs a closure standing in for the interrupt taken
    pub struct MockMcu<F: Fn()> {
        on_wake: F,
        halts: Cell<u32>,
    }

    impl<F: Fn()> MockMcu<F> {
        pub fn new(on_wake: F) -> Self {
            Self {
                on_wake,
                halts: Cell::new(0),
            }
        }

        pub fn halts(&self) -> u32 {
            self.halts.get()
        }
    }

    impl<F: Fn()> Mcu for MockMcu<F> {
        fn wait_for_interrupt(&self) {
            self.halts.set(self.halts.get() + 1);
            (self.on_wake)();
        }
    }
}
