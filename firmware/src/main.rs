#![no_std]
#![no_main]

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// Panic handler
#[cfg(feature = "defmt")]
use panic_probe as _;

use cortex_m_rt::entry;
use nrf52832_pac::interrupt;

use radiosoc_core::facilitator::{
    start_hfxo_and_sleep_until_running, start_long_clock_with_sleep_until_running,
};
use radiosoc_core::*;
use radiosoc_firmware::fault::reset_or_halt;
use radiosoc_firmware::*;

/// How long the main loop sleeps without an event
const HEARTBEAT: Tick = 5 * TICK_HZ;

/// Main firmware entry point
#[entry]
fn main() -> ! {
    #[cfg(feature = "defmt")]
    defmt::info!("🔧 radiosoc firmware {} starting", radiosoc_firmware::VERSION);

    let interrupts = NrfInterrupts;
    let sleeper = Sleeper::new(&TIMERS, &REASON_FOR_WAKE, NrfMcu, SleeperConfig::default());

    if let Err(error) = start_long_clock_with_sleep_until_running(&LONG_CLOCK, &sleeper, &interrupts) {
        reset_or_halt(error);
    }
    #[cfg(feature = "defmt")]
    defmt::info!("✅ long clock running on {}", irq::CLOCK_CONFIG.lf_source);

    BrownoutMonitor.enable(PofThreshold::V21);

    if let Err(error) = start_hfxo_and_sleep_until_running(&HF_CRYSTAL, &sleeper, &interrupts) {
        reset_or_halt(error);
    }

    RadioEnd.enable_interrupt();
    interrupts.enable(InterruptLine::Radio);

    #[cfg(feature = "defmt")]
    defmt::info!("✨ ready, sleeping");

    loop {
        let reason = match sleeper.sleep_until_event_with_timeout(HEARTBEAT) {
            Ok(reason) => reason,
            Err(error) => reset_or_halt(error),
        };

        match reason {
            WakeReason::SleepTimerExpired => {
                #[cfg(feature = "defmt")]
                defmt::trace!("💓 heartbeat at {}", LONG_CLOCK.now_time());
            }
            WakeReason::MsgReceived => {
                #[cfg(feature = "defmt")]
                defmt::info!("📡 message at {}", LONG_CLOCK.now_time());
            }
            WakeReason::BrownoutWarning => {
                // Drop the crystal to ride out the dip
                HF_CRYSTAL.stop();
            }
            _other => {
                #[cfg(feature = "defmt")]
                defmt::debug!("woke: {}", _other);
            }
        }
    }
}

#[interrupt]
fn RTC1() {
    irq::on_rtc();
}

#[interrupt]
fn POWER_CLOCK() {
    irq::on_power_clock();
}

#[interrupt]
fn RADIO() {
    irq::on_radio();
}
