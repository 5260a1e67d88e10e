#![no_std]
#![cfg_attr(feature = "nightly", feature(thread_local))]

//! `srcu`: a Sleepable Read-Copy-Update domain.
//!
//! SRCU readers are wait-free and may block or be preempted inside their
//! read-side critical section — unlike classic RCU, a reader never has to
//! finish "in one breath". Writers call [`Domain::synchronize`] to wait for
//! every reader that was already inside a critical section to leave before
//! proceeding with a destructive update.
//!
//! Each [`Domain`] is an independent instance: readers on one domain never
//! delay a writer on another.
//!
//! # Usage
//!
//! ```
//! let domain = srcu::Domain::with_cpus(4).expect("allocation failed");
//!
//! let guard = domain.read();
//! // ... read shared data protected by `domain` ...
//! drop(guard);
//!
//! domain.synchronize();
//! ```
//!
//! # Tiers
//!
//! The CPU-slot a reader lands in is resolved, fastest to slowest:
//! - `percpu` feature: the real logical CPU id via the `rseq` crate (Linux x86_64)
//! - `nightly` feature: a `#[thread_local]` bucket id, assigned once per thread
//! - `std` feature: a `std::thread_local!` bucket id
//! - neither: a single shared slot (correct, not performant)

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

mod backoff;
mod cpu;
mod domain;
pub mod error;
mod percpu_ref;
#[cfg(feature = "stats")]
pub mod stats;
mod sync;
mod writer_gate;

pub use domain::{Domain, SrcuGuard, SrcuIndex};
pub use error::InitError;
