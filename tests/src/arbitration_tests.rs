//! Wake reason arbitration, table driven and property based

use proptest::prelude::*;
use radiosoc_core::{arbitrate, Arbitration, HalError, ReasonForWake, WakeReason};
use rstest::rstest;

const REPORTABLE: [WakeReason; 6] = [
    WakeReason::SleepTimerExpired,
    WakeReason::MsgReceived,
    WakeReason::CounterOverflowOrOtherTimerExpired,
    WakeReason::BrownoutWarning,
    WakeReason::ClockStarted,
    WakeReason::Unknown,
];

fn reportable() -> impl Strategy<Value = WakeReason> {
    prop::sample::select(REPORTABLE.to_vec())
}

#[rstest]
#[case(WakeReason::Cleared, WakeReason::SleepTimerExpired, Arbitration::Replace)]
#[case(WakeReason::Cleared, WakeReason::CounterOverflowOrOtherTimerExpired, Arbitration::Replace)]
#[case(WakeReason::Cleared, WakeReason::Unknown, Arbitration::Replace)]
#[case(WakeReason::SleepTimerExpired, WakeReason::SleepTimerExpired, Arbitration::Overrun)]
#[case(WakeReason::SleepTimerExpired, WakeReason::MsgReceived, Arbitration::Replace)]
#[case(WakeReason::SleepTimerExpired, WakeReason::ClockStarted, Arbitration::Keep)]
#[case(WakeReason::MsgReceived, WakeReason::SleepTimerExpired, Arbitration::Keep)]
#[case(WakeReason::MsgReceived, WakeReason::MsgReceived, Arbitration::Replace)]
#[case(WakeReason::MsgReceived, WakeReason::BrownoutWarning, Arbitration::Keep)]
#[case(WakeReason::CounterOverflowOrOtherTimerExpired, WakeReason::Unknown, Arbitration::Keep)]
#[case(WakeReason::Unknown, WakeReason::CounterOverflowOrOtherTimerExpired, Arbitration::Keep)]
#[case(WakeReason::CounterOverflowOrOtherTimerExpired, WakeReason::BrownoutWarning, Arbitration::Replace)]
#[case(WakeReason::ClockStarted, WakeReason::CounterOverflowOrOtherTimerExpired, Arbitration::Keep)]
#[case(WakeReason::BrownoutWarning, WakeReason::ClockStarted, Arbitration::Replace)]
#[case(WakeReason::ClockStarted, WakeReason::BrownoutWarning, Arbitration::Keep)]
#[case(WakeReason::MsgReceived, WakeReason::Cleared, Arbitration::Replace)]
fn test_arbitration_table(
    #[case] current: WakeReason,
    #[case] incoming: WakeReason,
    #[case] expected: Arbitration,
) {
    assert_eq!(arbitrate(current, incoming), expected);
}

#[rstest]
#[case(WakeReason::SleepTimerExpired)]
#[case(WakeReason::CounterOverflowOrOtherTimerExpired)]
#[case(WakeReason::BrownoutWarning)]
#[case(WakeReason::ClockStarted)]
#[case(WakeReason::Unknown)]
fn test_message_is_never_downgraded(#[case] incoming: WakeReason) {
    let reason = ReasonForWake::new();
    reason.set(WakeReason::MsgReceived).unwrap();
    assert_eq!(reason.set(incoming), Ok(()));
    assert_eq!(reason.get(), WakeReason::MsgReceived);
}

#[test]
fn test_reports_from_several_interrupts_keep_the_strongest() {
    let reason = ReasonForWake::new();
    let reporters: [&[WakeReason]; 4] = [
        &[WakeReason::CounterOverflowOrOtherTimerExpired; 200],
        &[WakeReason::ClockStarted; 200],
        &[WakeReason::BrownoutWarning; 200],
        &[WakeReason::MsgReceived],
    ];

    std::thread::scope(|scope| {
        for reports in reporters {
            let reason = &reason;
            scope.spawn(move || {
                for &report in reports {
                    reason.set(report).unwrap();
                }
            });
        }
    });

    assert_eq!(reason.get(), WakeReason::MsgReceived);
}

proptest! {
    #[test]
    fn prop_strongest_report_wins(reports in prop::collection::vec(reportable(), 1..32)) {
        let reason = ReasonForWake::new();
        for &report in &reports {
            let before = reason.get();
            let result = reason.set(report);
            let overrun = before == WakeReason::SleepTimerExpired
                && report == WakeReason::SleepTimerExpired;
            if overrun {
                prop_assert_eq!(result, Err(HalError::WakeReasonOverrun));
            } else {
                prop_assert_eq!(result, Ok(()));
            }
        }

        let expected = reports
            .iter()
            .copied()
            .filter(|report| !report.is_weak())
            .max_by_key(|report| report.priority())
            .unwrap_or(reports[0]);
        prop_assert_eq!(reason.get(), expected);
    }

    #[test]
    fn prop_clear_always_resets(reports in prop::collection::vec(reportable(), 0..8)) {
        let reason = ReasonForWake::new();
        for report in reports {
            let _ = reason.set(report);
        }
        reason.clear();
        prop_assert_eq!(reason.get(), WakeReason::Cleared);
    }
}
