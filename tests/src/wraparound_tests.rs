//! Counter wraparound: compare targets, timer expiry and the wide clock

use proptest::prelude::*;
use radiosoc_core::hal::mock::MockInterruptController;
use radiosoc_core::test_utils::sim_rtc::SimRtc;
use radiosoc_core::*;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::support::{wide, RunningOscillator};

#[test]
fn test_timer_across_wrap_fires_once_at_target() {
    let rtc = SimRtc::<3>::running();
    rtc.set_counter(COUNTER_MASK - 1);
    let timers = TimerService::new(rtc.counter(), rtc.channels());
    let calls = AtomicU32::new(0);
    let handler = |reason: TimerInterruptReason| {
        assert_eq!(reason, TimerInterruptReason::SleepTimerCompare);
        calls.fetch_add(1, Ordering::Relaxed);
    };

    timers.start_timer(TimerSlot::Third, 6, &handler).unwrap();
    assert_eq!(rtc.channel_target(2), 4);

    assert_eq!(rtc.advance_until_interrupt(100), Some(6));
    assert_eq!(timers.on_interrupt(false), 1 << 2);
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    // The stale compare value matches again a period later, silently
    rtc.set_counter(3);
    rtc.tick();
    assert!(rtc.channel_event(2));
    assert!(!rtc.interrupt_pending());
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[test]
fn test_max_timeout_lands_one_tick_behind_now() {
    let rtc = SimRtc::<1>::running();
    rtc.set_counter(0x12_3456);
    let timers = TimerService::new(rtc.counter(), rtc.channels());
    let handler = |_: TimerInterruptReason| {};

    timers.start_timer(TimerSlot::Sleep, MAX_TIMEOUT, &handler).unwrap();
    assert_eq!(rtc.channel_target(0), 0x12_3455);
}

proptest! {
    #[test]
    fn prop_compare_target_is_modular(now in 0..=COUNTER_MASK, timeout in MIN_TIMEOUT..=MAX_TIMEOUT) {
        let target = compare_target(now, timeout);
        prop_assert!(target <= COUNTER_MASK);
        prop_assert_eq!(target as u64, (now as u64 + timeout as u64) % (1 << COUNTER_BITS));
        prop_assert_eq!(target.wrapping_sub(now) & COUNTER_MASK, timeout & COUNTER_MASK);
    }

    #[test]
    fn prop_timer_fires_after_exactly_timeout(
        start in 0..=COUNTER_MASK,
        timeout in MIN_TIMEOUT..4096u32,
    ) {
        let rtc = SimRtc::<3>::running();
        rtc.set_counter(start);
        let timers = TimerService::new(rtc.counter(), rtc.channels());
        let handler = |_: TimerInterruptReason| {};

        timers.start_timer(TimerSlot::Second, timeout, &handler).unwrap();
        prop_assert_eq!(rtc.advance_until_interrupt(timeout + 1), Some(timeout));
        prop_assert_eq!(timers.on_interrupt(false), 1 << 1);
        prop_assert!(!timers.is_timer_started(TimerSlot::Second));
    }

    #[test]
    fn prop_wide_clock_advances_one_per_tick(before_wrap in 0u32..256, steps in 1u32..1024) {
        let rtc = SimRtc::<3>::new();
        let clock = MonotonicClock::new(rtc.counter(), RunningOscillator);
        let timers = TimerService::new(rtc.counter(), rtc.channels());
        let rtc_irq = RtcInterrupt::new(&clock, &timers);
        clock.start(&MockInterruptController::new()).unwrap();
        rtc.set_counter(COUNTER_MASK - before_wrap);

        let mut last = clock.now_time();
        prop_assert_eq!(last, wide(0, COUNTER_MASK - before_wrap));
        for _ in 0..steps {
            rtc.tick();
            if rtc.interrupt_pending() {
                prop_assert!(rtc_irq.on_interrupt().overflow);
            }
            let now = clock.now_time();
            prop_assert_eq!(now, last + 1);
            last = now;
        }

        let expected_overflows = u32::from(steps > before_wrap);
        prop_assert_eq!(clock.overflow_count(), expected_overflows);
    }
}
