//! nRF52832 Hardware Implementation
//!
//! RTC1 backs the monotonic clock and the timer slots. Register blocks are
//! reached through their fixed addresses; every type here is a zero-sized
//! or `Copy` handle so it can live in a `static`.

use cortex_m::peripheral::NVIC;
use nrf52832_pac as pac;

use radiosoc_core::{
    CompareChannel, CounterPeripheral, InterruptController, InterruptLine, LfClockSource, Mcu,
    OscillatorSource, Tick, COUNTER_MASK,
};

/// RTC INTEN bit for the overflow event
const RTC_INT_OVRFLW: u32 = 1 << 1;

/// RTC INTEN bit for compare channel 0; channel n is at this shifted by n
const RTC_INT_COMPARE0: u32 = 1 << 16;

/// CLOCK INTEN bits
const CLOCK_INT_HFCLKSTARTED: u32 = 1 << 0;
const CLOCK_INT_LFCLKSTARTED: u32 = 1 << 1;

/// STATE bit of HFCLKSTAT and LFCLKSTAT
const CLKSTAT_RUNNING: u32 = 1 << 16;

/// SRC field of HFCLKSTAT when the crystal drives HFCLK
const HFCLKSTAT_SRC_XTAL: u32 = 1;

/// POWER INTEN bit for the power-fail warning
const POWER_INT_POFWARN: u32 = 1 << 2;

/// RADIO INTEN bit for END
const RADIO_INT_END: u32 = 1 << 3;

/// Compare channels on RTC1
pub const RTC_COMPARE_CHANNELS: usize = 4;

fn rtc() -> &'static pac::rtc0::RegisterBlock {
    // SAFETY: fixed MMIO address; all accesses are single word reads/writes
    unsafe { &*pac::RTC1::ptr() }
}

fn clock() -> &'static pac::clock::RegisterBlock {
    // SAFETY: as above
    unsafe { &*pac::CLOCK::ptr() }
}

fn power() -> &'static pac::power::RegisterBlock {
    // SAFETY: as above
    unsafe { &*pac::POWER::ptr() }
}

fn radio() -> &'static pac::radio::RegisterBlock {
    // SAFETY: as above
    unsafe { &*pac::RADIO::ptr() }
}

/// RTC1 counter
#[derive(Copy, Clone, Debug)]
pub struct NrfCounter;

impl CounterPeripheral for NrfCounter {
    fn start(&self) {
        rtc().tasks_start.write(|w| unsafe { w.bits(1) });
    }

    fn stop(&self) {
        rtc().tasks_stop.write(|w| unsafe { w.bits(1) });
    }

    fn ticks(&self) -> Tick {
        rtc().counter.read().bits() & COUNTER_MASK
    }

    fn is_overflow_event(&self) -> bool {
        rtc().events_ovrflw.read().bits() != 0
    }

    fn clear_overflow_event(&self) {
        rtc().events_ovrflw.write(|w| unsafe { w.bits(0) });
        // Read back so the write lands before the handler returns
        let _ = rtc().events_ovrflw.read().bits();
    }

    fn configure_overflow_interrupt(&self) {
        // Called with the counter stopped; PRESCALER is only writable then
        rtc().prescaler.write(|w| unsafe { w.bits(0) });
        rtc().intenset.write(|w| unsafe { w.bits(RTC_INT_OVRFLW) });
    }
}

/// One RTC1 compare channel
#[derive(Copy, Clone, Debug)]
pub struct NrfCompare {
    index: usize,
}

impl NrfCompare {
    /// Handle for channel `index`
    ///
    /// # Panics
    ///
    /// At compile time when used in a `static` with an index RTC1 lacks.
    pub const fn new(index: usize) -> Self {
        assert!(index < RTC_COMPARE_CHANNELS);
        Self { index }
    }

    fn int_mask(&self) -> u32 {
        RTC_INT_COMPARE0 << self.index
    }
}

impl CompareChannel for NrfCompare {
    fn set(&self, target: Tick) {
        rtc().cc[self.index].write(|w| unsafe { w.bits(target & COUNTER_MASK) });
    }

    fn enable_interrupt(&self) {
        rtc().intenset.write(|w| unsafe { w.bits(self.int_mask()) });
    }

    fn disable_interrupt(&self) {
        rtc().intenclr.write(|w| unsafe { w.bits(self.int_mask()) });
    }

    fn clear_event(&self) {
        rtc().events_compare[self.index].write(|w| unsafe { w.bits(0) });
        let _ = rtc().events_compare[self.index].read().bits();
    }

    fn is_event(&self) -> bool {
        rtc().events_compare[self.index].read().bits() != 0
    }
}

/// Low frequency clock feeding the RTC
#[derive(Copy, Clone, Debug)]
pub struct LfClock {
    source: LfClockSource,
}

impl LfClock {
    pub const fn new(source: LfClockSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> LfClockSource {
        self.source
    }

    /// Returns true and clears the event if LFCLKSTARTED is pending
    pub fn take_started_event(&self) -> bool {
        if clock().events_lfclkstarted.read().bits() == 0 {
            return false;
        }
        clock().events_lfclkstarted.write(|w| unsafe { w.bits(0) });
        let _ = clock().events_lfclkstarted.read().bits();
        true
    }
}

impl OscillatorSource for LfClock {
    fn configure(&self) {
        let src = match self.source {
            LfClockSource::Rc => 0,
            LfClockSource::Crystal => 1,
            LfClockSource::Synthesized => 2,
        };
        clock().lfclksrc.write(|w| unsafe { w.bits(src) });
    }

    fn start(&self) {
        clock().events_lfclkstarted.write(|w| unsafe { w.bits(0) });
        clock().tasks_lfclkstart.write(|w| unsafe { w.bits(1) });
    }

    fn is_running(&self) -> bool {
        clock().lfclkstat.read().bits() & CLKSTAT_RUNNING != 0
    }

    fn enable_started_interrupt(&self) {
        clock().intenset.write(|w| unsafe { w.bits(CLOCK_INT_LFCLKSTARTED) });
    }

    fn disable_started_interrupt(&self) {
        clock().intenclr.write(|w| unsafe { w.bits(CLOCK_INT_LFCLKSTARTED) });
    }
}

/// External high frequency crystal, needed by the radio
#[derive(Copy, Clone, Debug)]
pub struct HfCrystal;

impl HfCrystal {
    /// Returns true and clears the event if HFCLKSTARTED is pending
    pub fn take_started_event(&self) -> bool {
        if clock().events_hfclkstarted.read().bits() == 0 {
            return false;
        }
        clock().events_hfclkstarted.write(|w| unsafe { w.bits(0) });
        let _ = clock().events_hfclkstarted.read().bits();
        true
    }

    /// Release the crystal; HFCLK falls back to the internal oscillator
    pub fn stop(&self) {
        clock().tasks_hfclkstop.write(|w| unsafe { w.bits(1) });
    }
}

impl OscillatorSource for HfCrystal {
    fn configure(&self) {}

    fn start(&self) {
        clock().events_hfclkstarted.write(|w| unsafe { w.bits(0) });
        clock().tasks_hfclkstart.write(|w| unsafe { w.bits(1) });
    }

    fn is_running(&self) -> bool {
        let stat = clock().hfclkstat.read().bits();
        stat & CLKSTAT_RUNNING != 0 && stat & HFCLKSTAT_SRC_XTAL != 0
    }

    fn enable_started_interrupt(&self) {
        clock().intenset.write(|w| unsafe { w.bits(CLOCK_INT_HFCLKSTARTED) });
    }

    fn disable_started_interrupt(&self) {
        clock().intenclr.write(|w| unsafe { w.bits(CLOCK_INT_HFCLKSTARTED) });
    }
}

/// Power-fail comparator thresholds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PofThreshold {
    V19 = 6,
    V20 = 7,
    V21 = 8,
    V22 = 9,
    V23 = 10,
    V24 = 11,
    V25 = 12,
    V26 = 13,
    V27 = 14,
    V28 = 15,
}

/// Power-fail comparator, reported as a brownout warning
#[derive(Copy, Clone, Debug)]
pub struct BrownoutMonitor;

impl BrownoutMonitor {
    /// Warn when the supply falls below `threshold`
    pub fn enable(&self, threshold: PofThreshold) {
        let pofcon = 1 | ((threshold as u32) << 1);
        power().pofcon.write(|w| unsafe { w.bits(pofcon) });
        power().events_pofwarn.write(|w| unsafe { w.bits(0) });
        power().intenset.write(|w| unsafe { w.bits(POWER_INT_POFWARN) });
    }

    /// Stop the comparator; it keeps firing while the supply stays low
    pub fn disable(&self) {
        power().intenclr.write(|w| unsafe { w.bits(POWER_INT_POFWARN) });
        power().pofcon.write(|w| unsafe { w.bits(0) });
    }

    /// Returns true and clears the event if POFWARN is pending
    pub fn take_warning_event(&self) -> bool {
        if power().events_pofwarn.read().bits() == 0 {
            return false;
        }
        power().events_pofwarn.write(|w| unsafe { w.bits(0) });
        let _ = power().events_pofwarn.read().bits();
        true
    }
}

/// The radio's END event, the only radio event the sleeper cares about
#[derive(Copy, Clone, Debug)]
pub struct RadioEnd;

impl RadioEnd {
    pub fn enable_interrupt(&self) {
        radio().intenset.write(|w| unsafe { w.bits(RADIO_INT_END) });
    }

    pub fn disable_interrupt(&self) {
        radio().intenclr.write(|w| unsafe { w.bits(RADIO_INT_END) });
    }

    /// Returns true and clears the event if END is pending
    pub fn take_event(&self) -> bool {
        if radio().events_end.read().bits() == 0 {
            return false;
        }
        radio().events_end.write(|w| unsafe { w.bits(0) });
        let _ = radio().events_end.read().bits();
        true
    }
}

/// NVIC lines used by the core
#[derive(Copy, Clone, Debug, Default)]
pub struct NrfInterrupts;

impl NrfInterrupts {
    fn irq(line: InterruptLine) -> pac::Interrupt {
        match line {
            InterruptLine::Rtc => pac::Interrupt::RTC1,
            InterruptLine::PowerClock => pac::Interrupt::POWER_CLOCK,
            InterruptLine::Radio => pac::Interrupt::RADIO,
        }
    }
}

impl InterruptController for NrfInterrupts {
    fn enable(&self, line: InterruptLine) {
        let irq = Self::irq(line);
        // A request latched while the line was masked is stale
        NVIC::unpend(irq);
        // SAFETY: the handlers only touch statics built for interrupt use
        unsafe { NVIC::unmask(irq) }
    }

    fn disable(&self, line: InterruptLine) {
        NVIC::mask(Self::irq(line));
    }

    fn clear_pending(&self, line: InterruptLine) {
        NVIC::unpend(Self::irq(line));
    }
}

/// Cortex-M4 halt
#[derive(Copy, Clone, Debug, Default)]
pub struct NrfMcu;

impl Mcu for NrfMcu {
    fn wait_for_interrupt(&self) {
        // SEV sets the event register and the first WFE consumes it, so the
        // second WFE sleeps unless an interrupt arrived in between
        cortex_m::asm::sev();
        cortex_m::asm::wfe();
        cortex_m::asm::wfe();
    }
}
