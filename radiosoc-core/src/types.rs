//! Core data types for the clock, timer and sleep subsystem

/// Raw value of the 24-bit hardware counter
pub type Tick = u32;

/// Counter value extended with the software overflow count
pub type WideTick = u64;

/// Number of valid bits in the hardware counter
pub const COUNTER_BITS: u32 = 24;

/// Mask of the valid counter bits
pub const COUNTER_MASK: Tick = (1 << COUNTER_BITS) - 1;

/// Smallest timeout a compare channel fires reliably for
pub const MIN_TIMEOUT: Tick = 2;

/// Largest timeout a single compare channel can express (about 8.5 minutes)
pub const MAX_TIMEOUT: Tick = COUNTER_MASK;

/// Counter frequency with prescaler 0
pub const TICK_HZ: u32 = 32_768;

/// Nominal length of one tick in nanoseconds (30.517 us)
pub const TICK_PERIOD_NS: u32 = 30_518;

/// Convert microseconds to ticks, rounding up
pub const fn ticks_from_micros(micros: u32) -> Tick {
    let ticks = (micros as u64 * TICK_HZ as u64 + 999_999) / 1_000_000;
    if ticks > MAX_TIMEOUT as u64 {
        MAX_TIMEOUT
    } else {
        ticks as Tick
    }
}

/// Convert ticks to microseconds, rounding down
pub const fn micros_from_ticks(ticks: Tick) -> u32 {
    ((ticks as u64 * 1_000_000) / TICK_HZ as u64) as u32
}

/// Timer slots, each bound to one hardware compare channel
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerSlot {
    /// Reserved for the sleeper's timeout
    Sleep = 0,
    /// General purpose slot
    Second = 1,
    /// General purpose slot
    Third = 2,
}

impl TimerSlot {
    /// All slots in dispatch order
    pub const ALL: [TimerSlot; 3] = [TimerSlot::Sleep, TimerSlot::Second, TimerSlot::Third];

    /// Index of the compare channel backing this slot
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Slot for a compare channel index
    pub const fn from_index(index: usize) -> Option<TimerSlot> {
        match index {
            0 => Some(TimerSlot::Sleep),
            1 => Some(TimerSlot::Second),
            2 => Some(TimerSlot::Third),
            _ => None,
        }
    }
}

/// Why a timer callback is being invoked
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerInterruptReason {
    /// The slot's own compare channel matched
    SleepTimerCompare,
    /// The slot is still armed but an overflow or another slot woke the CPU
    OverflowOrOtherTimerCompare,
}

/// Reason the last low-power halt ended
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "std", derive(Hash))]
#[repr(u8)]
pub enum WakeReason {
    /// Nothing reported since the last clear
    Cleared = 0,
    /// The sleep slot's timeout expired
    SleepTimerExpired = 1,
    /// The radio finished receiving a message
    MsgReceived = 2,
    /// The counter overflowed or a non-sleep timer fired
    CounterOverflowOrOtherTimerExpired = 3,
    /// Supply voltage fell below the power-fail threshold
    BrownoutWarning = 4,
    /// An oscillator reported it is running
    ClockStarted = 5,
    /// Woken by something that did not report itself
    Unknown = 6,
}

impl WakeReason {
    /// Decode the value stored in the shared cell
    pub const fn from_u8(value: u8) -> WakeReason {
        match value {
            0 => WakeReason::Cleared,
            1 => WakeReason::SleepTimerExpired,
            2 => WakeReason::MsgReceived,
            3 => WakeReason::CounterOverflowOrOtherTimerExpired,
            4 => WakeReason::BrownoutWarning,
            5 => WakeReason::ClockStarted,
            _ => WakeReason::Unknown,
        }
    }

    /// Arbitration rank; a reason never replaces one of higher rank.
    ///
    /// `MsgReceived` ranks highest so a received packet is never lost.
    /// `BrownoutWarning` and `ClockStarted` rank below `SleepTimerExpired`
    /// because they are also latched in their own peripheral status.
    pub const fn priority(self) -> u8 {
        match self {
            WakeReason::Cleared => 0,
            WakeReason::Unknown => 1,
            WakeReason::CounterOverflowOrOtherTimerExpired => 2,
            WakeReason::BrownoutWarning => 3,
            WakeReason::ClockStarted => 4,
            WakeReason::SleepTimerExpired => 5,
            WakeReason::MsgReceived => 6,
        }
    }

    /// Returns true if this reason is only recorded into a cleared cell
    pub const fn is_weak(self) -> bool {
        matches!(
            self,
            WakeReason::CounterOverflowOrOtherTimerExpired | WakeReason::Unknown
        )
    }
}

/// Physical source of the low frequency clock
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LfClockSource {
    /// External 32.768 kHz crystal
    Crystal,
    /// Internal RC oscillator
    Rc,
    /// Synthesized from the high frequency clock
    Synthesized,
}

impl LfClockSource {
    /// Worst case accuracy in parts per million
    pub const fn accuracy_ppm(&self) -> u32 {
        match self {
            LfClockSource::Crystal => 20,
            LfClockSource::Rc => 500,
            LfClockSource::Synthesized => 50,
        }
    }

    /// Typical start-up time in microseconds
    pub const fn startup_time_us(&self) -> u32 {
        match self {
            LfClockSource::Crystal => 250_000,
            LfClockSource::Rc => 600,
            LfClockSource::Synthesized => 100,
        }
    }
}

/// Clock configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    /// Oscillator driving the counter
    pub lf_source: LfClockSource,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            lf_source: LfClockSource::Crystal,
        }
    }
}

impl ClockConfig {
    pub const fn new(lf_source: LfClockSource) -> Self {
        Self { lf_source }
    }
}

/// Sleeper configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SleeperConfig {
    /// Largest timeout the application is expected to sleep for
    pub max_sane_timeout: Tick,
}

impl Default for SleeperConfig {
    fn default() -> Self {
        Self {
            max_sane_timeout: MAX_TIMEOUT,
        }
    }
}

impl SleeperConfig {
    /// Create a new configuration with validation
    pub fn new(max_sane_timeout: Tick) -> Result<Self, &'static str> {
        if max_sane_timeout < MIN_TIMEOUT {
            return Err("Max sane timeout must be at least MIN_TIMEOUT");
        }
        if max_sane_timeout > MAX_TIMEOUT {
            return Err("Max sane timeout must fit the 24-bit counter");
        }
        Ok(Self { max_sane_timeout })
    }

    /// Create a configuration from a limit in milliseconds
    pub fn from_millis(max_sane_ms: u32) -> Result<Self, &'static str> {
        if max_sane_ms > micros_from_ticks(MAX_TIMEOUT) / 1000 {
            return Err("Max sane timeout must fit the 24-bit counter");
        }
        Self::new(ticks_from_micros(max_sane_ms * 1000))
    }
}
