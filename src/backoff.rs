//! Adaptive back-off for the grace-period drain loop.
//!
//! SRCU read-side critical sections are normally short, so the grace-period
//! driver (`Domain::synchronize`/`synchronize_expedited`) spins briefly
//! before falling back to a coarser, interruptible sleep. The constants
//! here match the original kernel implementation's tuning, which the spec
//! carries over verbatim (`SYNCHRONIZE_SRCU_READER_DELAY`).

/// Microsecond-granularity busy-wait delay between drain retries.
pub(crate) const READER_DELAY_US: u64 = 5;

/// Number of expedited busy-wait retries before falling back to the
/// coarse yielding sleep even under `expedited`.
pub(crate) const EXPEDITED_RETRIES: u32 = 10;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// Busy-wait for approximately [`READER_DELAY_US`] microseconds.
        #[inline]
        pub(crate) fn busy_wait() {
            std::thread::sleep(std::time::Duration::from_micros(READER_DELAY_US));
        }

        /// Yield the CPU for approximately one scheduling tick (~1 ms).
        ///
        /// Marked interruptible only as a scheduling hint, per the spec: a
        /// `synchronize` call has no timeout and this never returns early.
        #[inline]
        pub(crate) fn yield_tick() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    } else {
        /// Without `std` there is no portable sleep, so back-off degrades to
        /// a bounded spin. This preserves correctness (the drain loop still
        /// only returns once readers have actually left) but not the
        /// bounded-latency intent of the busy-wait/yield split — consistent
        /// with the spec's own non-goal of bounded grace-period latency.
        #[inline]
        pub(crate) fn busy_wait() {
            for _ in 0..2_000 {
                core::hint::spin_loop();
            }
        }

        #[inline]
        pub(crate) fn yield_tick() {
            for _ in 0..200_000 {
                core::hint::spin_loop();
            }
        }
    }
}
