//! Oscillator start-up sequences that sleep instead of spinning

use crate::clock::MonotonicClock;
use crate::hal::{
    CompareChannel, CounterPeripheral, HalError, InterruptController, InterruptLine, Mcu,
    OscillatorSource,
};
use crate::sleeper::Sleeper;
use crate::types::{ticks_from_micros, Tick, WakeReason};

/// Typical start-up time of the high frequency crystal
pub const HFXO_STARTUP_TICKS: Tick = ticks_from_micros(360);

/// Start the low frequency oscillator, sleep until it reports running,
/// then start the monotonic clock on it
///
/// The oscillator-started interrupt must report
/// [`WakeReason::ClockStarted`]. The counter is not running yet, so the
/// sleep has no timeout.
pub fn start_long_clock_with_sleep_until_running<P, O, C, M, I, const N: usize>(
    clock: &MonotonicClock<P, O>,
    sleeper: &Sleeper<'_, '_, P, C, M, N>,
    interrupts: &I,
) -> Result<(), HalError>
where
    P: CounterPeripheral,
    O: OscillatorSource,
    C: CompareChannel,
    M: Mcu,
    I: InterruptController,
{
    let oscillator = clock.oscillator();
    if !oscillator.is_running() {
        interrupts.enable(InterruptLine::PowerClock);
        sleeper.clear_reason_for_wake();
        oscillator.enable_started_interrupt();
        oscillator.configure();
        oscillator.start();

        sleeper.sleep_until_event(WakeReason::ClockStarted);
        oscillator.disable_started_interrupt();

        #[cfg(feature = "defmt")]
        defmt::info!("🕰️ LF clock running");
    }
    clock.start(interrupts)
}

/// Start the high frequency crystal and sleep until it reports running
pub fn start_hfxo_and_sleep_until_running<P, C, M, X, I, const N: usize>(
    hfxo: &X,
    sleeper: &Sleeper<'_, '_, P, C, M, N>,
    interrupts: &I,
) -> Result<(), HalError>
where
    P: CounterPeripheral,
    C: CompareChannel,
    M: Mcu,
    X: OscillatorSource,
    I: InterruptController,
{
    if hfxo.is_running() {
        return Err(HalError::OscillatorAlreadyRunning);
    }

    interrupts.enable(InterruptLine::PowerClock);
    hfxo.enable_started_interrupt();
    sleeper.clear_reason_for_wake();
    hfxo.start();

    // Does not clear first: the started interrupt may already have fired
    sleeper.sleep_until_event(WakeReason::ClockStarted);
    hfxo.disable_started_interrupt();

    #[cfg(feature = "defmt")]
    defmt::info!("⚡ HFXO running");

    Ok(())
}

/// Start the high frequency crystal and sleep for a fixed `delay`
///
/// Used when the started interrupt is not wanted; [`HFXO_STARTUP_TICKS`]
/// covers the typical start-up time.
pub fn start_hfxo_with_constant_expected_delay<P, C, M, X, const N: usize>(
    hfxo: &X,
    sleeper: &Sleeper<'_, '_, P, C, M, N>,
    delay: Tick,
) -> Result<(), HalError>
where
    P: CounterPeripheral,
    C: CompareChannel,
    M: Mcu,
    X: OscillatorSource,
{
    if hfxo.is_running() {
        return Err(HalError::OscillatorAlreadyRunning);
    }

    sleeper.clear_reason_for_wake();
    hfxo.start();
    sleeper.sleep_until_timeout(delay)
}
