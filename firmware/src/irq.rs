//! Statics shared with the interrupt handlers
//!
//! `main` owns the vector table entries and forwards to the functions here.

use radiosoc_core::{
    ClockConfig, LfClockSource, MonotonicClock, ReasonForWake, RtcInterrupt, TimerService,
    WakeReason, TIMER_SLOTS,
};

use crate::nrf52832_hardware::{
    BrownoutMonitor, HfCrystal, LfClock, NrfCompare, NrfCounter, RadioEnd,
};

/// Low frequency clock selection
pub const CLOCK_CONFIG: ClockConfig = ClockConfig::new(LfClockSource::Crystal);

pub type Clock = MonotonicClock<NrfCounter, LfClock>;
pub type Timers = TimerService<'static, NrfCounter, NrfCompare, TIMER_SLOTS>;

/// Reason the last halt ended, written from every handler
pub static REASON_FOR_WAKE: ReasonForWake = ReasonForWake::new();

/// RTC1 extended to 56 bits
pub static LONG_CLOCK: Clock =
    MonotonicClock::new(NrfCounter, LfClock::new(CLOCK_CONFIG.lf_source));

/// RTC1 compare channels 0..3; channel 3 is left free
pub static TIMERS: Timers = TimerService::new(
    NrfCounter,
    [NrfCompare::new(0), NrfCompare::new(1), NrfCompare::new(2)],
);

pub static RTC_INTERRUPT: RtcInterrupt<'static, 'static, NrfCounter, LfClock, NrfCompare, TIMER_SLOTS> =
    RtcInterrupt::new(&LONG_CLOCK, &TIMERS);

pub static HF_CRYSTAL: HfCrystal = HfCrystal;

/// Body of the RTC1 handler
pub fn on_rtc() {
    let serviced = RTC_INTERRUPT.on_interrupt();
    if serviced.is_spurious() {
        #[cfg(feature = "defmt")]
        defmt::trace!("spurious RTC1 entry");
        let _ = REASON_FOR_WAKE.set(WakeReason::Unknown);
    }
}

/// Body of the POWER_CLOCK handler
///
/// LFCLK and HFCLK started both report `ClockStarted`; only one
/// oscillator is started at a time. A power-fail warning disables the
/// comparator, which would otherwise fire again on every entry.
pub fn on_power_clock() {
    let lf_started = LONG_CLOCK.oscillator().take_started_event();
    let hf_started = HF_CRYSTAL.take_started_event();
    if lf_started || hf_started {
        let _ = REASON_FOR_WAKE.set(WakeReason::ClockStarted);
    }

    let monitor = BrownoutMonitor;
    if monitor.take_warning_event() {
        monitor.disable();
        #[cfg(feature = "defmt")]
        defmt::warn!("🔋 brownout warning");
        let _ = REASON_FOR_WAKE.set(WakeReason::BrownoutWarning);
    }
}

/// Body of the RADIO handler
pub fn on_radio() {
    if RadioEnd.take_event() {
        let _ = REASON_FOR_WAKE.set(WakeReason::MsgReceived);
    }
}
