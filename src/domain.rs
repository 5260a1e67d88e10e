//! The SRCU domain: public API, read-side fast path, and grace-period
//! driver. This is the thin glue around [`crate::percpu_ref`] (counter
//! summation/validation), [`crate::cpu`] (slot resolution), and
//! [`crate::backoff`] (adaptive drain back-off).

use core::sync::atomic::{AtomicU64, Ordering, fence};

use crate::backoff;
use crate::cpu;
use crate::error::InitError;
use crate::percpu_ref::PerCpuRef;
use crate::writer_gate::WriterGate;

#[cfg(feature = "stats")]
use crate::stats::{self, Stats};

/// A reader token: the bank a matching [`Domain::leave`] must name.
///
/// Returned by [`Domain::enter`]. Carries no domain identity — passing it
/// to the wrong domain is a documented non-goal, not something the type
/// system catches — but `#[must_use]` turns the common "entered and never
/// left" mistake into a compiler warning.
#[derive(Debug)]
#[must_use = "a SrcuIndex must be passed to a matching Domain::leave, or the read-side critical section never un-registers"]
pub struct SrcuIndex(pub(crate) usize);

/// An SRCU read-side critical section, scoped to this guard's lifetime.
///
/// `leave`s automatically on drop. Prefer this over raw [`SrcuIndex`]
/// handling unless the critical section must cross a boundary a borrow
/// can't (e.g. stored in a struct and closed from a different call frame).
#[must_use = "the read-side critical section ends when this guard is dropped"]
pub struct SrcuGuard<'a> {
    domain: &'a Domain,
    bank: usize,
}

impl Drop for SrcuGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.domain.leave_bank(self.bank);
    }
}

/// An independent SRCU domain.
///
/// Grace periods on one domain never wait on readers of another. See the
/// crate-level docs for the read/write protocol.
pub struct Domain {
    /// Monotonic grace-period counter; its low bit selects the bank new
    /// readers use. Widened to 64 bits, resolving the spec's own open
    /// question about 32-bit wraparound.
    completed: AtomicU64,
    /// Serializes writers; never held across a read-side critical section.
    writer_gate: WriterGate,
    /// Per-slot `(c, seq)` counter pairs, one slot per provisioned CPU.
    percpu: PerCpuRef,
    #[cfg(feature = "stats")]
    stats: Stats,
}

impl Domain {
    /// Construct a domain sized for the host's available parallelism.
    ///
    /// Requires `std` to query [`std::thread::available_parallelism`]; use
    /// [`Domain::with_cpus`] to pick an explicit count without it.
    #[cfg(feature = "std")]
    pub fn new() -> Result<Self, InitError> {
        let num_cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_cpus(num_cpus)
    }

    /// Construct a domain provisioned for exactly `num_cpus` slots.
    ///
    /// `num_cpus` need not match the real core count — it only bounds how
    /// many distinct slots readers are spread across; a smaller count just
    /// means more slot collisions (still correct, per [`crate::percpu_ref`]).
    ///
    /// Fails only if allocating the per-slot counter storage fails.
    pub fn with_cpus(num_cpus: usize) -> Result<Self, InitError> {
        let percpu = PerCpuRef::try_new(num_cpus).ok_or(InitError::AllocationFailed)?;
        Ok(Self {
            completed: AtomicU64::new(0),
            writer_gate: WriterGate::new(),
            percpu,
            #[cfg(feature = "stats")]
            stats: Stats::new(),
        })
    }

    /// Enter a read-side critical section. Never fails, never blocks.
    ///
    /// The returned [`SrcuIndex`] must be passed to exactly one matching
    /// [`Domain::leave`] — not necessarily from the same thread, and not
    /// necessarily before this thread does anything else (that's the
    /// "sleepable" property: an SRCU reader may block or be preempted
    /// inside its section).
    #[inline]
    pub fn enter(&self) -> SrcuIndex {
        // Acquire rather than Relaxed per the spec's own resolved open
        // question: cheap defense-in-depth, off the hot contended path.
        let bank = (self.completed.load(Ordering::Acquire) & 1) as usize;
        let slot = cpu::current_slot(self.percpu.len());
        self.percpu.enter(slot, bank);
        SrcuIndex(bank)
    }

    /// Leave a read-side critical section. Never fails, never blocks.
    ///
    /// `idx` must be the token returned by the matching [`Domain::enter`].
    #[inline]
    pub fn leave(&self, idx: SrcuIndex) {
        self.leave_bank(idx.0);
    }

    #[inline]
    fn leave_bank(&self, bank: usize) {
        let slot = cpu::current_slot(self.percpu.len());
        self.percpu.leave(slot, bank);
    }

    /// Enter a read-side critical section as an RAII guard that leaves on drop.
    #[inline]
    pub fn read(&self) -> SrcuGuard<'_> {
        let SrcuIndex(bank) = self.enter();
        SrcuGuard { domain: self, bank }
    }

    /// Wait for a grace period: every critical section that began before
    /// this call must have ended before it returns.
    ///
    /// Must not be called from inside a read-side critical section of
    /// *this* domain — that is a self-deadlock the library does not detect.
    pub fn synchronize(&self) {
        self.synchronize_impl(false);
    }

    /// Like [`Domain::synchronize`], but spins more aggressively before
    /// yielding the CPU, trading throughput for lower latency under load.
    pub fn synchronize_expedited(&self) {
        self.synchronize_impl(true);
    }

    fn synchronize_impl(&self, expedited: bool) {
        // All prior updates by this caller must precede the grace period
        // in the global order, so destructive updates after synchronize
        // returns are safe to perform.
        fence(Ordering::SeqCst);
        let snapshot = self.completed.load(Ordering::Relaxed);
        fence(Ordering::SeqCst);

        let _gate = self.writer_gate.lock();

        // Piggyback short-circuit: see how far `completed` moved while we
        // waited for the gate. Three advances guarantee two full flip
        // pairs bracket our call (one may have started before our first
        // fence above); two guarantee one, so we still owe a second flip.
        let current = self.completed.load(Ordering::Relaxed);
        let start = if current == snapshot + 2 {
            1
        } else if current == snapshot + 3 {
            #[cfg(feature = "stats")]
            {
                self.stats.record_piggyback();
                self.stats.record_grace_period();
            }
            #[cfg(feature = "debug")]
            std::eprintln!("[srcu] synchronize subsumed by a concurrent writer's piggyback");
            return;
        } else {
            0
        };

        for _ in start..2 {
            self.flip_and_wait(expedited);
        }

        #[cfg(feature = "stats")]
        self.stats.record_grace_period();
    }

    /// Advance `completed`, switching which bank new readers use, then wait
    /// for the bank readers are draining out of to reach a stable zero.
    ///
    /// Called twice per (non-piggybacked) grace period — see the spec's
    /// own rationale for why one flip is not enough: a reader that sampled
    /// `completed` just before this flip but had not yet bumped its
    /// counter is invisible to this drain; the *second* flip reassigns
    /// that reader to the bank we then wait on.
    fn flip_and_wait(&self, expedited: bool) {
        let prev = self.completed.fetch_add(1, Ordering::Relaxed);
        let bank = (prev & 1) as usize;
        #[cfg(feature = "stats")]
        self.stats.record_flip();

        if self.percpu.drained(bank) {
            return;
        }

        // SRCU read sections are normally short: one short spin first.
        backoff::busy_wait();
        if self.percpu.drained(bank) {
            return;
        }

        let mut expedited_retries = 0u32;
        loop {
            if expedited && expedited_retries < backoff::EXPEDITED_RETRIES {
                expedited_retries += 1;
                backoff::busy_wait();
            } else {
                backoff::yield_tick();
            }
            if self.percpu.drained(bank) {
                return;
            }
        }
    }

    /// Number of grace periods completed so far. Advisory only — not
    /// synchronized with any other operation.
    #[inline]
    pub fn batches_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// A snapshot of this domain's grace-period counters.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> stats::Snapshot {
        self.stats.snapshot()
    }

    /// Consume the domain, releasing its per-slot counter storage.
    ///
    /// Refuses (returning the domain back to the caller) if any reader is
    /// still active, always emitting a warning: a storage leak is
    /// preferable to freeing out from under a still-running reader.
    pub fn try_cleanup(self) -> Result<(), Self> {
        if self.outstanding_readers() != 0 {
            #[cfg(feature = "std")]
            std::eprintln!("[srcu] cleanup refused: reader(s) still active");
            return Err(self);
        }
        Ok(())
    }

    fn outstanding_readers(&self) -> usize {
        self.percpu.active(0).wrapping_add(self.percpu.active(1))
    }
}

impl Drop for Domain {
    fn drop(&mut self) {
        #[cfg(feature = "debug")]
        {
            let sum = self.outstanding_readers();
            if sum != 0 {
                std::eprintln!("[srcu] domain dropped with outstanding reader(s) (sum={sum})");
            }
        }
    }
}
