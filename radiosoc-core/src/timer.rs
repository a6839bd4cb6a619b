//! One-shot timers on the counter's compare channels

use core::cell::UnsafeCell;
use portable_atomic::{AtomicBool, Ordering};

use crate::hal::{CompareChannel, CounterPeripheral, HalError};
use crate::types::{Tick, TimerInterruptReason, TimerSlot, COUNTER_MASK, MAX_TIMEOUT, MIN_TIMEOUT};

/// Callback run from the counter interrupt when a timer fires
pub trait TimerHandler: Sync {
    fn on_timer(&self, reason: TimerInterruptReason);
}

impl<F> TimerHandler for F
where
    F: Fn(TimerInterruptReason) + Sync,
{
    fn on_timer(&self, reason: TimerInterruptReason) {
        self(reason)
    }
}

/// Compare value that matches `timeout` ticks after `now`
pub const fn compare_target(now: Tick, timeout: Tick) -> Tick {
    (now & COUNTER_MASK).wrapping_add(timeout) & COUNTER_MASK
}

struct Slot<'h> {
    armed: AtomicBool,
    handler: UnsafeCell<Option<&'h dyn TimerHandler>>,
}

impl<'h> Slot<'h> {
    const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            handler: UnsafeCell::new(None),
        }
    }

    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// # Safety
    ///
    /// The slot must not be armed. An idle slot's interrupt is disabled and
    /// the interrupt handler never reads the handler of an idle slot.
    unsafe fn set_handler(&self, handler: Option<&'h dyn TimerHandler>) {
        *self.handler.get() = handler;
    }

    /// # Safety
    ///
    /// Must only be called from the counter interrupt after observing the
    /// slot armed. The main flow cannot run while the interrupt does.
    unsafe fn handler(&self) -> Option<&'h dyn TimerHandler> {
        *self.handler.get()
    }
}

// SAFETY: the handler cell is written by whichever context owns the idle
// slot and read only by the interrupt handler while the slot is armed.
// This holds only for one main flow and one non-reentrant interrupt on a
// single core; see the `TimerService` concurrency notes. Two threads
// starting or cancelling the same slot would race on the cell.
unsafe impl Sync for Slot<'_> {}

/// Fixed set of one-shot timers, slot `i` on compare channel `i`
///
/// [`TimerSlot::Sleep`] is reserved for the [`Sleeper`](crate::sleeper::Sleeper).
/// The interrupt side is [`on_interrupt`](TimerService::on_interrupt),
/// normally called through [`RtcInterrupt`](crate::dispatch::RtcInterrupt).
///
/// # Concurrency
///
/// The service is `Sync` so it can sit in a `static` shared with the
/// counter interrupt, but it assumes a single core with exactly two
/// contexts: one main flow that starts and cancels timers, and one
/// non-reentrant interrupt handler that services them. Starting or
/// cancelling the same slot from two threads races on the slot's handler
/// and is not supported, even with the `std` feature where nothing stops
/// safe code from doing it. Simulations must likewise keep timer
/// management on one thread and servicing on another.
pub struct TimerService<'h, P, C, const N: usize> {
    counter: P,
    channels: [C; N],
    slots: [Slot<'h>; N],
}

impl<'h, P, C, const N: usize> TimerService<'h, P, C, N>
where
    P: CounterPeripheral,
    C: CompareChannel,
{
    /// Bind compare channel `i` to timer slot `i`
    pub const fn new(counter: P, channels: [C; N]) -> Self {
        Self {
            counter,
            channels,
            slots: [const { Slot::new() }; N],
        }
    }

    fn slot(&self, slot: TimerSlot) -> Result<(&C, &Slot<'h>), HalError> {
        match (self.channels.get(slot.index()), self.slots.get(slot.index())) {
            (Some(channel), Some(state)) => Ok((channel, state)),
            _ => Err(HalError::InvalidSlot(slot)),
        }
    }

    /// Arm `slot` to call `handler` once, `timeout` ticks from now
    ///
    /// The compare value is written before the interrupt is enabled, with
    /// nothing slow in between: if the counter passes the target first, the
    /// match only happens after a full counter period.
    pub fn start_timer(
        &self,
        slot: TimerSlot,
        timeout: Tick,
        handler: &'h dyn TimerHandler,
    ) -> Result<(), HalError> {
        if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&timeout) {
            return Err(HalError::TimeoutOutOfRange { timeout });
        }
        let (channel, state) = self.slot(slot)?;
        if state.is_armed() {
            return Err(HalError::TimerAlreadyStarted(slot));
        }

        // SAFETY: checked idle above
        unsafe { state.set_handler(Some(handler)) };

        let target = compare_target(self.counter.ticks(), timeout);
        channel.set(target);
        channel.clear_event();
        state.armed.store(true, Ordering::Release);
        channel.enable_interrupt();

        #[cfg(feature = "defmt")]
        defmt::trace!("timer {} armed for {} at {}", slot, timeout, target);

        Ok(())
    }

    /// Stop `slot` from firing. Legal on an idle slot.
    pub fn cancel_timer(&self, slot: TimerSlot) -> Result<(), HalError> {
        let (channel, state) = self.slot(slot)?;
        channel.disable_interrupt_and_clear_event();
        state.armed.store(false, Ordering::Release);
        // SAFETY: the slot is idle from here on
        unsafe { state.set_handler(None) };
        Ok(())
    }

    /// Check if `slot` has a callback that has not fired or been cancelled
    pub fn is_timer_started(&self, slot: TimerSlot) -> bool {
        self.slots
            .get(slot.index())
            .map_or(false, |state| state.is_armed())
    }

    /// Raw counter value the timeouts are measured from
    pub fn ticks(&self) -> Tick {
        self.counter.ticks() & COUNTER_MASK
    }

    /// Compare channel backing `slot`
    pub fn channel(&self, slot: TimerSlot) -> Option<&C> {
        self.channels.get(slot.index())
    }

    /// Timer part of the shared counter interrupt, every slot in index order
    ///
    /// Returns a bit mask of the slots that fired.
    pub fn on_interrupt(&self, overflowed: bool) -> u8 {
        let mut fired = 0u8;
        for slot in TimerSlot::ALL.iter().take(N) {
            if self.service_slot(*slot, overflowed) {
                fired |= 1 << slot.index();
            }
        }
        fired
    }

    /// Service one slot from the counter interrupt
    ///
    /// A matched slot is cancelled before its handler runs, so a handler may
    /// re-arm its own slot. The sleep slot must be serviced before the
    /// others: if it is armed and did not match, but the entry also carries
    /// an overflow or another slot's match, its handler is told so with
    /// [`OverflowOrOtherTimerCompare`](TimerInterruptReason::OverflowOrOtherTimerCompare).
    ///
    /// Returns true if the slot fired. A slot this service lacks never does.
    pub fn service_slot(&self, slot: TimerSlot, overflowed: bool) -> bool {
        let index = slot.index();
        if index >= N {
            return false;
        }
        if self.fire(index) {
            return true;
        }
        if slot == TimerSlot::Sleep && self.slots[index].is_armed() && self.others_pending(overflowed) {
            // SAFETY: in interrupt context with the slot armed
            if let Some(handler) = unsafe { self.slots[index].handler() } {
                handler.on_timer(TimerInterruptReason::OverflowOrOtherTimerCompare);
            }
        }
        false
    }

    fn others_pending(&self, overflowed: bool) -> bool {
        overflowed || (1..N).any(|index| self.is_pending(index))
    }

    fn is_pending(&self, index: usize) -> bool {
        self.slots[index].is_armed() && self.channels[index].is_event()
    }

    fn fire(&self, index: usize) -> bool {
        if !self.is_pending(index) {
            return false;
        }
        let state = &self.slots[index];
        // SAFETY: in interrupt context with the slot armed
        let handler = unsafe { state.handler() };

        self.channels[index].disable_interrupt_and_clear_event();
        state.armed.store(false, Ordering::Release);
        // SAFETY: the slot is idle from here on
        unsafe { state.set_handler(None) };

        #[cfg(feature = "defmt")]
        defmt::trace!("timer {} fired", index);

        if let Some(handler) = handler {
            handler.on_timer(TimerInterruptReason::SleepTimerCompare);
        }
        true
    }
}
