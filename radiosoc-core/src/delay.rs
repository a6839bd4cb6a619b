//! `embedded-hal` delay that sleeps instead of spinning

use embedded_hal::delay::DelayNs;

use crate::hal::{CompareChannel, CounterPeripheral, Mcu};
use crate::sleeper::Sleeper;
use crate::types::{Tick, MIN_TIMEOUT, TICK_HZ};

const fn ticks_ceil(amount: u64, per_second: u64) -> u64 {
    (amount * TICK_HZ as u64).div_ceil(per_second)
}

/// Timeout that covers `piece` whole ticks even if the match comes early
const fn piece_timeout(piece: u64) -> Tick {
    let timeout = piece as Tick + 1;
    if timeout < MIN_TIMEOUT {
        MIN_TIMEOUT
    } else {
        timeout
    }
}

/// [`DelayNs`] on top of [`Sleeper::sleep_until_timeout`]
///
/// Delays are rounded up to whole ticks and split into pieces the sleep
/// timer can express. A compare match may land up to one tick early, since
/// the tick in progress when the timer is armed is already partly over, so
/// every piece sleeps one tick more than it covers and never less than
/// [`MIN_TIMEOUT`]. A delay therefore lasts at least as long as requested.
///
/// # Panics
///
/// If the sleep slot is already in use. `DelayNs` has no error path and a
/// busy sleep slot is a programming error.
pub struct LowPowerDelay<'s, 'a, 'h, P, C, M, const N: usize> {
    sleeper: &'s Sleeper<'a, 'h, P, C, M, N>,
}

impl<'s, 'a, 'h, P, C, M, const N: usize> LowPowerDelay<'s, 'a, 'h, P, C, M, N>
where
    P: CounterPeripheral,
    C: CompareChannel,
    M: Mcu,
{
    pub fn new(sleeper: &'s Sleeper<'a, 'h, P, C, M, N>) -> Self {
        Self { sleeper }
    }

    /// Sleep for at least `ticks`
    pub fn sleep_ticks(&mut self, ticks: u64) {
        // Room for the extra tick each piece sleeps
        let piece_limit = (self.sleeper.max_sane_timeout() - 1) as u64;
        let mut remaining = ticks;
        while remaining > 0 {
            let piece = remaining.min(piece_limit);
            if let Err(error) = self.sleeper.sleep_until_timeout(piece_timeout(piece)) {
                panic!("low-power delay failed: {:?}", error);
            }
            remaining -= piece;
        }
    }
}

impl<P, C, M, const N: usize> DelayNs for LowPowerDelay<'_, '_, '_, P, C, M, N>
where
    P: CounterPeripheral,
    C: CompareChannel,
    M: Mcu,
{
    fn delay_ns(&mut self, ns: u32) {
        self.sleep_ticks(ticks_ceil(ns as u64, 1_000_000_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.sleep_ticks(ticks_ceil(us as u64, 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sleep_ticks(ticks_ceil(ms as u64, 1_000));
    }
}
