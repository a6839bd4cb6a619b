//! End to end sleep scenarios on the simulated counter and MCU

use embedded_hal::delay::DelayNs;
use radiosoc_core::hal::mock::MockInterruptController;
use radiosoc_core::test_utils::sim_mcu::SimMcu;
use radiosoc_core::test_utils::sim_rtc::SimRtc;
use radiosoc_core::*;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::support::RunningOscillator;

/// Started clock, timers and sleeper, with the counter at `$start`
macro_rules! system {
    ($rtc:ident, $clock:ident, $timers:ident, $reason:ident, $sleeper:ident, $start:expr) => {
        let $rtc = SimRtc::<3>::new();
        let $reason = ReasonForWake::new();
        let $clock = MonotonicClock::new($rtc.counter(), RunningOscillator);
        let $timers = TimerService::new($rtc.counter(), $rtc.channels());
        let rtc_irq = RtcInterrupt::new(&$clock, &$timers);
        let isr = || {
            rtc_irq.on_interrupt();
        };
        $clock.start(&MockInterruptController::new()).unwrap();
        $rtc.set_counter($start);
        let $sleeper = Sleeper::new(&$timers, &$reason, SimMcu::new(&$rtc, &isr), default_sleeper_config());
    };
}

#[test]
fn test_receive_window_ends_on_message() {
    system!(rtc, clock, timers, reason, sleeper, 1_000);
    let radio_end = || reason.set(WakeReason::MsgReceived).unwrap();
    sleeper.mcu().schedule(300, &radio_end);

    let woke = sleeper.sleep_until_event_with_timeout(1_000).unwrap();

    assert_eq!(woke, WakeReason::MsgReceived);
    assert_eq!(rtc.elapsed(), 300);
    assert_eq!(clock.now_time(), 1_300);
    assert!(!timers.is_timer_started(TimerSlot::Sleep));
    assert!(!rtc.channel_interrupt_enabled(TimerSlot::Sleep.index()));
}

#[test]
fn test_receive_window_times_out() {
    system!(rtc, clock, timers, reason, sleeper, 0);
    let radio_end = || reason.set(WakeReason::MsgReceived).unwrap();
    sleeper.mcu().schedule(1_500, &radio_end);

    assert_eq!(
        sleeper.sleep_until_event_with_timeout(1_000),
        Ok(WakeReason::SleepTimerExpired)
    );
    assert_eq!(rtc.elapsed(), 1_000);
    assert_eq!(sleeper.mcu().scheduled(), 1);
    assert!(!timers.is_timer_started(TimerSlot::Sleep));
    assert_eq!(clock.overflow_count(), 0);
}

#[test]
fn test_overflow_during_sleep_is_absorbed() {
    system!(rtc, clock, _timers, _reason, sleeper, COUNTER_MASK - 50);

    // The overflow wakes the CPU once, the rest of the timeout is slept again
    sleeper.sleep_until_timeout(100).unwrap();

    assert_eq!(rtc.elapsed(), 100);
    assert_eq!(sleeper.mcu().halts(), 2);
    assert_eq!(clock.overflow_count(), 1);
    assert_eq!(clock.now_time(), (1 << COUNTER_BITS) + 49);
    assert_eq!(sleeper.get_reason_for_wake(), WakeReason::SleepTimerExpired);
}

#[test]
fn test_other_timer_wakes_sleeper() {
    system!(rtc, _clock, timers, _reason, sleeper, 500);
    let fired = AtomicU32::new(0);
    let housekeeping = |reason: TimerInterruptReason| {
        assert_eq!(reason, TimerInterruptReason::SleepTimerCompare);
        fired.fetch_add(1, Ordering::Relaxed);
    };
    timers.start_timer(TimerSlot::Second, 40, &housekeeping).unwrap();

    let woke = sleeper.sleep_until_event_with_timeout(100).unwrap();

    assert_eq!(woke, WakeReason::CounterOverflowOrOtherTimerExpired);
    assert_eq!(rtc.elapsed(), 40);
    assert_eq!(fired.load(Ordering::Relaxed), 1);
    assert!(!timers.is_timer_started(TimerSlot::Second));
    assert!(!timers.is_timer_started(TimerSlot::Sleep));
}

#[test]
fn test_message_inside_timeout_sleep_is_not_returned() {
    system!(rtc, _clock, _timers, reason, sleeper, 0);
    let radio_end = || reason.set(WakeReason::MsgReceived).unwrap();
    sleeper.mcu().schedule(30, &radio_end);

    sleeper.sleep_until_timeout(100).unwrap();

    assert_eq!(rtc.elapsed(), 100);
    assert_eq!(sleeper.mcu().halts(), 2);
    assert_eq!(sleeper.get_reason_for_wake(), WakeReason::SleepTimerExpired);
}

#[test]
fn test_brownout_ends_sleep() {
    system!(rtc, _clock, _timers, reason, sleeper, 0);
    let pofwarn = || reason.set(WakeReason::BrownoutWarning).unwrap();
    sleeper.mcu().schedule(10, &pofwarn);

    assert_eq!(
        sleeper.sleep_until_event_with_timeout(5_000),
        Ok(WakeReason::BrownoutWarning)
    );
    assert_eq!(rtc.elapsed(), 10);
}

#[test]
fn test_low_power_delay_across_overflow() {
    system!(rtc, clock, _timers, _reason, sleeper, COUNTER_MASK - 1_000);
    let mut delay = LowPowerDelay::new(&sleeper);

    delay.delay_ms(1_000);

    assert!(rtc.elapsed() >= TICK_HZ as u64);
    assert!(rtc.elapsed() <= TICK_HZ as u64 + 1);
    assert_eq!(clock.overflow_count(), 1);
    assert_eq!(sleeper.mcu().halts(), 2);
}

#[test]
fn test_unused_slots_survive_sleep() {
    system!(_rtc, _clock, timers, _reason, sleeper, 0);
    let late = |_: TimerInterruptReason| {};
    timers.start_timer(TimerSlot::Third, 10_000, &late).unwrap();

    sleeper.sleep_until_timeout(200).unwrap();

    assert!(timers.is_timer_started(TimerSlot::Third));
    assert!(!timers.is_timer_started(TimerSlot::Sleep));
}
