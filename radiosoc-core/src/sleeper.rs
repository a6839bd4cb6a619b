//! Low-power sleep until a timeout or a reported event

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::hal::{CompareChannel, CounterPeripheral, HalError, Mcu};
use crate::timer::{TimerHandler, TimerService};
use crate::types::{
    SleeperConfig, Tick, TimerInterruptReason, TimerSlot, WakeReason, COUNTER_MASK, MIN_TIMEOUT,
};

/// Outcome of reporting a wake reason into the shared cell
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Arbitration {
    /// The incoming reason is stored
    Replace,
    /// The current reason stays
    Keep,
    /// The sleep timer expired again before its expiry was consumed
    Overrun,
}

/// Decide whether `incoming` may replace `current`
///
/// - `MsgReceived` is never replaced until the next clear.
/// - `CounterOverflowOrOtherTimerExpired` and `Unknown` are stored only into
///   a cleared cell.
/// - `SleepTimerExpired` arriving while `SleepTimerExpired` is stored is an
///   overrun.
/// - Otherwise the higher [`priority`](WakeReason::priority) wins; ties
///   replace.
pub const fn arbitrate(current: WakeReason, incoming: WakeReason) -> Arbitration {
    if matches!(incoming, WakeReason::Cleared) {
        return Arbitration::Replace;
    }
    if matches!(incoming, WakeReason::SleepTimerExpired)
        && matches!(current, WakeReason::SleepTimerExpired)
    {
        return Arbitration::Overrun;
    }
    if incoming.is_weak() {
        return if matches!(current, WakeReason::Cleared) {
            Arbitration::Replace
        } else {
            Arbitration::Keep
        };
    }
    if incoming.priority() >= current.priority() {
        Arbitration::Replace
    } else {
        Arbitration::Keep
    }
}

/// The single shared reason the last halt ended
///
/// Written from interrupt context by the sleep timer, the radio, the
/// oscillators and the brownout monitor; read and cleared by the main flow.
pub struct ReasonForWake {
    reason: AtomicU8,
    overrun: AtomicBool,
}

impl Default for ReasonForWake {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasonForWake {
    pub const fn new() -> Self {
        Self {
            reason: AtomicU8::new(WakeReason::Cleared as u8),
            overrun: AtomicBool::new(false),
        }
    }

    pub fn get(&self) -> WakeReason {
        WakeReason::from_u8(self.reason.load(Ordering::Acquire))
    }

    pub fn clear(&self) {
        self.reason.store(WakeReason::Cleared as u8, Ordering::Release);
    }

    /// Report `reason`, subject to [`arbitrate`]
    ///
    /// The compare-and-swap loop keeps a report from one interrupt from
    /// overwriting a concurrent higher priority one.
    pub fn set(&self, reason: WakeReason) -> Result<(), HalError> {
        let mut outcome = Arbitration::Keep;
        let _ = self
            .reason
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                outcome = arbitrate(WakeReason::from_u8(current), reason);
                match outcome {
                    Arbitration::Replace => Some(reason as u8),
                    Arbitration::Keep | Arbitration::Overrun => None,
                }
            });

        match outcome {
            Arbitration::Overrun => {
                #[cfg(feature = "defmt")]
                defmt::warn!("wake reason overrun");
                Err(HalError::WakeReasonOverrun)
            }
            Arbitration::Replace | Arbitration::Keep => Ok(()),
        }
    }

    /// Returns true once if an overrun happened in interrupt context
    pub fn take_overrun(&self) -> bool {
        self.overrun.swap(false, Ordering::AcqRel)
    }
}

/// Sleep slot callback. Errors cannot leave the interrupt, so an overrun is
/// latched for the sleeping caller to pick up.
impl TimerHandler for ReasonForWake {
    fn on_timer(&self, reason: TimerInterruptReason) {
        let wake = match reason {
            TimerInterruptReason::SleepTimerCompare => WakeReason::SleepTimerExpired,
            TimerInterruptReason::OverflowOrOtherTimerCompare => {
                WakeReason::CounterOverflowOrOtherTimerExpired
            }
        };
        if self.set(wake).is_err() {
            self.overrun.store(true, Ordering::Release);
        }
    }
}

/// Blocks the CPU in low power until a timeout or a reported event
///
/// Owns [`TimerSlot::Sleep`] of the timer service; nothing else may use it.
pub struct Sleeper<'a, 'h, P, C, M, const N: usize> {
    timers: &'a TimerService<'h, P, C, N>,
    reason: &'h ReasonForWake,
    mcu: M,
    config: SleeperConfig,
}

impl<'a, 'h, P, C, M, const N: usize> Sleeper<'a, 'h, P, C, M, N>
where
    P: CounterPeripheral,
    C: CompareChannel,
    M: Mcu,
{
    pub fn new(
        timers: &'a TimerService<'h, P, C, N>,
        reason: &'h ReasonForWake,
        mcu: M,
        config: SleeperConfig,
    ) -> Self {
        Self {
            timers,
            reason,
            mcu,
            config,
        }
    }

    /// Halt once, with the sleep timer armed for `timeout` ticks
    ///
    /// Below [`MIN_TIMEOUT`] the compare channel cannot fire reliably, so the
    /// expiry is reported without halting. On return the sleep timer is
    /// cancelled. The reason may be `Cleared` or
    /// `CounterOverflowOrOtherTimerExpired` after an unrelated interrupt;
    /// the caller decides whether to sleep again.
    pub fn sleep_until_event_with_timeout(&self, timeout: Tick) -> Result<WakeReason, HalError> {
        self.reason.clear();

        if timeout < MIN_TIMEOUT {
            self.reason.set(WakeReason::SleepTimerExpired)?;
            return Ok(WakeReason::SleepTimerExpired);
        }
        if timeout > self.config.max_sane_timeout {
            return Err(HalError::TimeoutOutOfRange { timeout });
        }

        self.timers.start_timer(TimerSlot::Sleep, timeout, self.reason)?;
        self.mcu.wait_for_interrupt();
        self.timers.cancel_timer(TimerSlot::Sleep)?;

        if self.reason.take_overrun() {
            return Err(HalError::WakeReasonOverrun);
        }

        let reason = self.reason.get();
        #[cfg(feature = "defmt")]
        defmt::trace!("woke: {}", reason);
        Ok(reason)
    }

    /// Halt repeatedly until `reason` has been reported
    ///
    /// Does not clear the current reason first: an event reported before the
    /// call returns without halting.
    pub fn sleep_until_event(&self, reason: WakeReason) {
        while self.reason.get() != reason {
            self.mcu.wait_for_interrupt();
        }
    }

    /// Sleep until `timeout` ticks have really elapsed
    ///
    /// Other wakes are absorbed: after each one the remaining time is slept
    /// again. A reported `MsgReceived` is therefore not returned; use
    /// [`sleep_until_event_with_timeout`](Self::sleep_until_event_with_timeout)
    /// when messages matter.
    pub fn sleep_until_timeout(&self, timeout: Tick) -> Result<(), HalError> {
        if timeout > self.config.max_sane_timeout {
            return Err(HalError::TimeoutOutOfRange { timeout });
        }

        let start = self.timers.ticks();
        loop {
            let elapsed = self.timers.ticks().wrapping_sub(start) & COUNTER_MASK;
            if elapsed >= timeout {
                return Ok(());
            }
            if self.sleep_until_event_with_timeout(timeout - elapsed)? == WakeReason::SleepTimerExpired {
                return Ok(());
            }
        }
    }

    /// Cancel the sleep timer
    pub fn cancel_timeout(&self) -> Result<(), HalError> {
        self.timers.cancel_timer(TimerSlot::Sleep)
    }

    pub fn get_reason_for_wake(&self) -> WakeReason {
        self.reason.get()
    }

    pub fn clear_reason_for_wake(&self) {
        self.reason.clear()
    }

    /// Report an event, as the interrupt handlers do
    pub fn set_reason_for_wake(&self, reason: WakeReason) -> Result<(), HalError> {
        self.reason.set(reason)
    }

    pub fn max_sane_timeout(&self) -> Tick {
        self.config.max_sane_timeout
    }

    pub fn mcu(&self) -> &M {
        &self.mcu
    }

    pub fn timers(&self) -> &'a TimerService<'h, P, C, N> {
        self.timers
    }
}
