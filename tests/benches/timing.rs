use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use radiosoc_core::hal::mock::MockInterruptController;
use radiosoc_core::test_utils::sim_rtc::SimRtc;
use radiosoc_core::*;
use radiosoc_tests::support::RunningOscillator;

fn bench_now_time(c: &mut Criterion) {
    let rtc = SimRtc::<3>::new();
    let clock = MonotonicClock::new(rtc.counter(), RunningOscillator);
    clock.start(&MockInterruptController::new()).unwrap();
    rtc.set_counter(0x12_3456);

    c.bench_function("now_time", |b| b.iter(|| black_box(clock.now_time())));
}

fn bench_arbitration(c: &mut Criterion) {
    let reason = ReasonForWake::new();

    c.bench_function("reason_for_wake_set", |b| {
        b.iter(|| {
            reason.clear();
            reason.set(black_box(WakeReason::CounterOverflowOrOtherTimerExpired)).unwrap();
            reason.set(black_box(WakeReason::MsgReceived)).unwrap();
        })
    });
}

fn bench_timer_dispatch(c: &mut Criterion) {
    let rtc = SimRtc::<3>::running();
    let timers = TimerService::new(rtc.counter(), rtc.channels());
    let handler = |_: TimerInterruptReason| {};

    c.bench_function("start_fire_timer", |b| {
        b.iter(|| {
            timers.start_timer(TimerSlot::Second, MIN_TIMEOUT, &handler).unwrap();
            rtc.advance(MIN_TIMEOUT);
            black_box(timers.on_interrupt(false))
        })
    });
}

criterion_group!(benches, bench_now_time, bench_arbitration, bench_timer_dispatch);
criterion_main!(benches);
