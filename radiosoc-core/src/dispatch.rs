//! Shared counter interrupt: overflow and every compare channel on one vector

use crate::clock::MonotonicClock;
use crate::hal::{CompareChannel, CounterPeripheral, OscillatorSource};
use crate::timer::TimerService;
use crate::types::TimerSlot;

/// Interrupt sources behind the counter vector, in service order
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptSource {
    Overflow,
    Compare(TimerSlot),
}

/// Order in which one interrupt entry drains its sources
///
/// [`RtcInterrupt::on_interrupt`] walks this table. The overflow comes
/// first so the sleep slot knows about it, and the sleep slot comes before
/// the other slots so it is told about their matches before their
/// handlers run.
pub const SERVICE_ORDER: [InterruptSource; 4] = [
    InterruptSource::Overflow,
    InterruptSource::Compare(TimerSlot::Sleep),
    InterruptSource::Compare(TimerSlot::Second),
    InterruptSource::Compare(TimerSlot::Third),
];

/// What one interrupt entry serviced
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Serviced {
    /// Overflow count was incremented
    pub overflow: bool,
    /// Bit `i` set if slot `i` fired
    pub fired: u8,
}

impl Serviced {
    /// Check if `source` was serviced
    pub fn contains(&self, source: InterruptSource) -> bool {
        match source {
            InterruptSource::Overflow => self.overflow,
            InterruptSource::Compare(slot) => self.fired & (1 << slot.index()) != 0,
        }
    }

    /// Returns true if nothing was pending
    pub fn is_spurious(&self) -> bool {
        !self.overflow && self.fired == 0
    }
}

/// Handler for the counter's interrupt vector
///
/// The line does not queue, so one entry can stand for several events.
/// Each entry walks [`SERVICE_ORDER`] and services every pending source.
/// Compare entries for slots beyond the service's `N` channels are
/// skipped.
pub struct RtcInterrupt<'a, 'h, P, O, C, const N: usize> {
    clock: &'a MonotonicClock<P, O>,
    timers: &'a TimerService<'h, P, C, N>,
}

impl<'a, 'h, P, O, C, const N: usize> RtcInterrupt<'a, 'h, P, O, C, N>
where
    P: CounterPeripheral,
    O: OscillatorSource,
    C: CompareChannel,
{
    pub const fn new(clock: &'a MonotonicClock<P, O>, timers: &'a TimerService<'h, P, C, N>) -> Self {
        Self { clock, timers }
    }

    /// Service everything pending. Called from the interrupt vector only.
    pub fn on_interrupt(&self) -> Serviced {
        let mut serviced = Serviced::default();
        for source in SERVICE_ORDER {
            match source {
                InterruptSource::Overflow => {
                    serviced.overflow = self.clock.on_overflow_interrupt();
                }
                InterruptSource::Compare(slot) if slot.index() < N => {
                    if self.timers.service_slot(slot, serviced.overflow) {
                        serviced.fired |= 1 << slot.index();
                    }
                }
                InterruptSource::Compare(_) => {}
            }
        }

        #[cfg(feature = "defmt")]
        if serviced.overflow && serviced.fired == 0 {
            defmt::trace!("rtc: overflow only");
        }

        serviced
    }

    pub fn clock(&self) -> &'a MonotonicClock<P, O> {
        self.clock
    }

    pub fn timers(&self) -> &'a TimerService<'h, P, C, N> {
        self.timers
    }
}
