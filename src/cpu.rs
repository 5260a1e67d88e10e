//! CPU-slot resolution: the userspace stand-in for "pin to current CPU".
//!
//! The kernel original runs `enter`/`leave` with preemption disabled, so
//! `this_cpu_ptr` always names the same slot for the duration of the call.
//! Userspace Rust has no portable way to disable preemption on the current
//! thread, so [`current_slot`] instead resolves, fastest to slowest:
//!
//! 1. `percpu` feature: the real logical CPU id, via the `rseq` crate
//!    (Linux x86_64, glibc-registered or self-managed rseq area).
//! 2. `nightly` feature: a `#[thread_local]` bucket id, assigned once per
//!    thread from a global monotonic counter and cached thereafter.
//! 3. `std` feature: the same bucket scheme using `std::thread_local!`.
//! 4. Neither: a single shared slot — correct (the counters are atomics;
//!    see [`crate::percpu_ref`]) but serializes all readers onto one slot.
//!
//! Because this is a best-effort bucket rather than a true CPU pin, two
//! threads can collide on the same slot. That is explicitly accounted for:
//! slot counters are atomics, not plain words.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Global source of fresh bucket ids, one per thread that ever calls
/// [`bucket::current_bucket`].
static NEXT_BUCKET: AtomicUsize = AtomicUsize::new(0);

fn fresh_bucket() -> usize {
    NEXT_BUCKET.fetch_add(1, Ordering::Relaxed)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "nightly")] {
        #[thread_local]
        static BUCKET: core::cell::Cell<Option<usize>> = core::cell::Cell::new(None);

        fn current_bucket() -> usize {
            if let Some(id) = BUCKET.get() {
                return id;
            }
            let id = fresh_bucket();
            BUCKET.set(Some(id));
            id
        }
    } else if #[cfg(feature = "std")] {
        std::thread_local! {
            static BUCKET: core::cell::Cell<Option<usize>> = const { core::cell::Cell::new(None) };
        }

        fn current_bucket() -> usize {
            BUCKET.with(|cell| {
                if let Some(id) = cell.get() {
                    return id;
                }
                let id = fresh_bucket();
                cell.set(Some(id));
                id
            })
        }
    }
}

/// Resolve the current caller to a slot index in `0..num_slots`.
///
/// `num_slots` is the domain's slot count; a given thread's bucket (or real
/// CPU id) is simply taken modulo it, so the same thread can address
/// domains provisioned for different slot counts.
#[inline]
pub(crate) fn current_slot(num_slots: usize) -> usize {
    let num_slots = num_slots.max(1);

    cfg_if::cfg_if! {
        if #[cfg(feature = "percpu")] {
            match rseq::current_cpu() {
                Some(cpu) => (cpu as usize) % num_slots,
                None => current_bucket() % num_slots,
            }
        } else if #[cfg(any(feature = "nightly", feature = "std"))] {
            current_bucket() % num_slots
        } else {
            let _ = num_slots;
            0
        }
    }
}
