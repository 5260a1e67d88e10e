//! Per-domain grace-period statistics, available under the `stats` feature.
//!
//! All counters use `Relaxed` ordering — they are observational only and
//! never used for synchronization. The domain's own `completed` counter and
//! writer gate provide the real ordering guarantees; these exist purely for
//! monitoring, mirroring the allocator's own `stats` counters in shape.

use core::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct Stats {
    /// Completed calls to `synchronize`/`synchronize_expedited`.
    pub(crate) grace_periods: AtomicU64,
    /// Total index flips performed (0, 1, or 2 per grace period).
    pub(crate) flips: AtomicU64,
    /// Grace periods that returned via the piggyback short-circuit.
    pub(crate) piggybacks: AtomicU64,
}

impl Stats {
    pub(crate) const fn new() -> Self {
        Self {
            grace_periods: AtomicU64::new(0),
            flips: AtomicU64::new(0),
            piggybacks: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_grace_period(&self) {
        self.grace_periods.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_flip(&self) {
        self.flips.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_piggyback(&self) {
        self.piggybacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            grace_periods: self.grace_periods.load(Ordering::Relaxed),
            flips: self.flips.load(Ordering::Relaxed),
            piggybacks: self.piggybacks.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of one domain's grace-period statistics.
///
/// Individual fields are each atomically read, but the snapshot as a whole
/// is not globally consistent with itself — a concurrent `synchronize` may
/// race between the loads. For monitoring purposes this is always enough.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Completed calls to `synchronize`/`synchronize_expedited`.
    pub grace_periods: u64,
    /// Total index flips performed across all grace periods.
    pub flips: u64,
    /// Grace periods that returned via the piggyback short-circuit.
    pub piggybacks: u64,
}
