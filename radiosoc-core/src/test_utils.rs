//! Test utilities: simulated counter peripheral and MCU

pub mod sim_rtc {
    //! Simulated 24-bit counter with compare channels
    //!
    //! Time only moves when a test calls [`SimRtc::tick`] or
    //! [`SimRtc::advance`], or when a [`SimMcu`](super::sim_mcu::SimMcu)
    //! halts. All state is atomic so a second thread can play the
    //! interrupt context.

    use crate::hal::{CompareChannel, CounterPeripheral};
    use crate::types::{Tick, COUNTER_MASK};
    use portable_atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

    struct SimChannel {
        target: AtomicU32,
        event: AtomicBool,
        interrupt_enabled: AtomicBool,
    }

    impl SimChannel {
        const fn new() -> Self {
            Self {
                target: AtomicU32::new(0),
                event: AtomicBool::new(false),
                interrupt_enabled: AtomicBool::new(false),
            }
        }
    }

    /// Simulated counter with `N` compare channels
    pub struct SimRtc<const N: usize> {
        counter: AtomicU32,
        running: AtomicBool,
        overflow_event: AtomicBool,
        overflow_interrupt: AtomicBool,
        channels: [SimChannel; N],
        elapsed: AtomicU64,
        counter_reads: AtomicU32,
        preemptive: AtomicBool,
    }

    impl<const N: usize> Default for SimRtc<N> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<const N: usize> SimRtc<N> {
        /// Stopped counter at zero
        pub const fn new() -> Self {
            Self {
                counter: AtomicU32::new(0),
                running: AtomicBool::new(false),
                overflow_event: AtomicBool::new(false),
                overflow_interrupt: AtomicBool::new(false),
                channels: [const { SimChannel::new() }; N],
                elapsed: AtomicU64::new(0),
                counter_reads: AtomicU32::new(0),
                preemptive: AtomicBool::new(false),
            }
        }

        /// Counter that is already running
        pub fn running() -> Self {
            let rtc = Self::new();
            rtc.running.store(true, Ordering::Release);
            rtc
        }

        /// Handle implementing [`CounterPeripheral`]
        pub fn counter(&self) -> SimCounter<'_, N> {
            SimCounter { rtc: self }
        }

        /// Handle implementing [`CompareChannel`] for channel `index`
        pub fn channel(&self, index: usize) -> SimCompare<'_, N> {
            assert!(index < N, "channel {} out of range", index);
            SimCompare { rtc: self, index }
        }

        /// Handles for all channels, in index order
        pub fn channels(&self) -> [SimCompare<'_, N>; N] {
            core::array::from_fn(|index| SimCompare { rtc: self, index })
        }

        /// Advance simulated time one tick
        ///
        /// A running counter increments, raising overflow and match events
        /// before the new count becomes visible.
        pub fn tick(&self) {
            self.elapsed.fetch_add(1, Ordering::AcqRel);
            if !self.running.load(Ordering::Acquire) {
                return;
            }
            let next = (self.counter.load(Ordering::Acquire) + 1) & COUNTER_MASK;
            if next == 0 {
                self.overflow_event.store(true, Ordering::Release);
            }
            for channel in &self.channels {
                if channel.target.load(Ordering::Acquire) == next {
                    channel.event.store(true, Ordering::Release);
                }
            }
            self.counter.store(next, Ordering::Release);
        }

        pub fn advance(&self, ticks: u32) {
            for _ in 0..ticks {
                self.tick();
            }
        }

        /// Tick until an enabled interrupt is pending, up to `limit` ticks
        ///
        /// Returns the number of ticks taken.
        pub fn advance_until_interrupt(&self, limit: u32) -> Option<u32> {
            for taken in 0..=limit {
                if self.interrupt_pending() {
                    return Some(taken);
                }
                self.tick();
            }
            None
        }

        /// Jump the counter without raising events
        pub fn set_counter(&self, value: Tick) {
            self.counter.store(value & COUNTER_MASK, Ordering::Release);
        }

        pub fn is_running(&self) -> bool {
            self.running.load(Ordering::Acquire)
        }

        /// Ticks of simulated time since creation, running or not
        pub fn elapsed(&self) -> u64 {
            self.elapsed.load(Ordering::Acquire)
        }

        /// Number of counter register reads
        pub fn counter_reads(&self) -> u32 {
            self.counter_reads.load(Ordering::Acquire)
        }

        pub fn overflow_pending(&self) -> bool {
            self.overflow_event.load(Ordering::Acquire)
        }

        pub fn overflow_interrupt_enabled(&self) -> bool {
            self.overflow_interrupt.load(Ordering::Acquire)
        }

        pub fn channel_target(&self, index: usize) -> Tick {
            self.channels[index].target.load(Ordering::Acquire)
        }

        pub fn channel_event(&self, index: usize) -> bool {
            self.channels[index].event.load(Ordering::Acquire)
        }

        pub fn channel_interrupt_enabled(&self, index: usize) -> bool {
            self.channels[index].interrupt_enabled.load(Ordering::Acquire)
        }

        /// Raise a match event on a channel directly
        pub fn force_channel_event(&self, index: usize) {
            self.channels[index].event.store(true, Ordering::Release);
        }

        /// Check if any event with its interrupt enabled is pending
        pub fn interrupt_pending(&self) -> bool {
            if self.overflow_event.load(Ordering::Acquire)
                && self.overflow_interrupt.load(Ordering::Acquire)
            {
                return true;
            }
            self.channels.iter().any(|channel| {
                channel.event.load(Ordering::Acquire)
                    && channel.interrupt_enabled.load(Ordering::Acquire)
            })
        }

        /// Make counter reads wait for pending interrupts to be serviced
        ///
        /// On hardware a pending enabled interrupt is taken before the next
        /// instruction of the main flow. When another thread plays the
        /// interrupt handler, this keeps reads from running ahead of it.
        pub fn set_preemptive(&self, preemptive: bool) {
            self.preemptive.store(preemptive, Ordering::Release);
        }
    }

    /// [`CounterPeripheral`] view of a [`SimRtc`]
    #[derive(Copy, Clone)]
    pub struct SimCounter<'a, const N: usize> {
        rtc: &'a SimRtc<N>,
    }

    impl<const N: usize> CounterPeripheral for SimCounter<'_, N> {
        fn start(&self) {
            self.rtc.running.store(true, Ordering::Release);
        }

        fn stop(&self) {
            self.rtc.running.store(false, Ordering::Release);
        }

        fn ticks(&self) -> Tick {
            self.rtc.counter_reads.fetch_add(1, Ordering::AcqRel);
            let value = self.rtc.counter.load(Ordering::Acquire);
            if self.rtc.preemptive.load(Ordering::Acquire) {
                while self.rtc.interrupt_pending() {
                    core::hint::spin_loop();
                }
            }
            value
        }

        fn is_overflow_event(&self) -> bool {
            self.rtc.overflow_event.load(Ordering::Acquire)
        }

        fn clear_overflow_event(&self) {
            self.rtc.overflow_event.store(false, Ordering::Release);
        }

        fn configure_overflow_interrupt(&self) {
            self.rtc.overflow_interrupt.store(true, Ordering::Release);
        }
    }

    /// [`CompareChannel`] view of one channel of a [`SimRtc`]
    #[derive(Copy, Clone)]
    pub struct SimCompare<'a, const N: usize> {
        rtc: &'a SimRtc<N>,
        index: usize,
    }

    impl<const N: usize> SimCompare<'_, N> {
        pub fn index(&self) -> usize {
            self.index
        }
    }

    impl<const N: usize> CompareChannel for SimCompare<'_, N> {
        fn set(&self, target: Tick) {
            self.rtc.channels[self.index]
                .target
                .store(target & COUNTER_MASK, Ordering::Release);
        }

        fn enable_interrupt(&self) {
            self.rtc.channels[self.index]
                .interrupt_enabled
                .store(true, Ordering::Release);
        }

        fn disable_interrupt(&self) {
            self.rtc.channels[self.index]
                .interrupt_enabled
                .store(false, Ordering::Release);
        }

        fn clear_event(&self) {
            self.rtc.channels[self.index].event.store(false, Ordering::Release);
        }

        fn is_event(&self) -> bool {
            self.rtc.channels[self.index].event.load(Ordering::Acquire)
        }
    }
}

pub mod sim_mcu {
    //! Simulated processor halt

    use super::sim_rtc::SimRtc;
    use crate::hal::Mcu;
    use core::cell::{Cell, RefCell};

    /// Ticks a halt may simulate before the test is declared hung
    pub const DEFAULT_HALT_LIMIT: u32 = 1 << 20;

    /// Most external wakes that can be scheduled at once
    pub const MAX_SCHEDULED: usize = 8;

    /// Interrupt from outside the counter, such as a received packet
    #[derive(Copy, Clone)]
    pub struct ExternalWake<'a> {
        /// Simulated tick at which the interrupt is taken
        pub at_tick: u64,
        /// Interrupt handler to run
        pub handler: &'a dyn Fn(),
    }

    /// MCU whose halt advances simulated time until an interrupt is taken
    ///
    /// Each halt ticks the [`SimRtc`] until either an enabled counter
    /// interrupt is pending, which runs `rtc_isr`, or the next scheduled
    /// external wake is due, which runs its handler. An enabled counter
    /// interrupt that is pending when the halt starts is taken immediately.
    pub struct SimMcu<'a, const N: usize> {
        rtc: &'a SimRtc<N>,
        rtc_isr: &'a dyn Fn(),
        external: RefCell<[Option<ExternalWake<'a>>; MAX_SCHEDULED]>,
        halts: Cell<u32>,
        limit: u32,
    }

    impl<'a, const N: usize> SimMcu<'a, N> {
        pub fn new(rtc: &'a SimRtc<N>, rtc_isr: &'a dyn Fn()) -> Self {
            Self {
                rtc,
                rtc_isr,
                external: RefCell::new([None; MAX_SCHEDULED]),
                halts: Cell::new(0),
                limit: DEFAULT_HALT_LIMIT,
            }
        }

        /// Override how many ticks a single halt may simulate
        pub fn with_halt_limit(mut self, limit: u32) -> Self {
            self.limit = limit;
            self
        }

        /// Schedule an external interrupt `after` ticks from now
        pub fn schedule(&self, after: u32, handler: &'a dyn Fn()) {
            let at_tick = self.rtc.elapsed() + after as u64;
            let mut external = self.external.borrow_mut();
            match external.iter_mut().find(|wake| wake.is_none()) {
                Some(free) => *free = Some(ExternalWake { at_tick, handler }),
                None => panic!("more than {} wakes scheduled", MAX_SCHEDULED),
            }
        }

        /// Number of halts executed
        pub fn halts(&self) -> u32 {
            self.halts.get()
        }

        /// Number of scheduled wakes not yet delivered
        pub fn scheduled(&self) -> usize {
            self.external.borrow().iter().filter(|wake| wake.is_some()).count()
        }

        fn take_due_external(&self) -> Option<&'a dyn Fn()> {
            let now = self.rtc.elapsed();
            let mut external = self.external.borrow_mut();
            external
                .iter_mut()
                .filter(|wake| matches!(wake, Some(wake) if wake.at_tick <= now))
                .min_by_key(|wake| wake.as_ref().map(|wake| wake.at_tick))
                .and_then(|wake| wake.take())
                .map(|wake| wake.handler)
        }
    }

    impl<const N: usize> Mcu for SimMcu<'_, N> {
        fn wait_for_interrupt(&self) {
            self.halts.set(self.halts.get() + 1);
            for _ in 0..=self.limit {
                if self.rtc.interrupt_pending() {
                    (self.rtc_isr)();
                    return;
                }
                if let Some(handler) = self.take_due_external() {
                    handler();
                    return;
                }
                self.rtc.tick();
            }
            panic!("halted {} ticks with no interrupt source", self.limit);
        }
    }
}
