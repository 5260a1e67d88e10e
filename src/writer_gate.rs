//! Writer serialization lock.
//!
//! Grace periods can legitimately take milliseconds (the drain loop may
//! yield the CPU repeatedly), so a real parking mutex is used when `std` is
//! available rather than a spinlock. Without `std`, falls back to the
//! crate's own [`crate::sync::SpinLock`].
//!
//! Never held across a read-side critical section — only [`Domain::synchronize`]
//! (and its expedited sibling) ever acquires it.
//!
//! [`Domain::synchronize`]: crate::Domain::synchronize

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        pub(crate) struct WriterGate {
            inner: std::sync::Mutex<()>,
        }

        pub(crate) struct WriterGuard<'a> {
            _guard: std::sync::MutexGuard<'a, ()>,
        }

        impl WriterGate {
            pub(crate) const fn new() -> Self {
                Self { inner: std::sync::Mutex::new(()) }
            }

            pub(crate) fn lock(&self) -> WriterGuard<'_> {
                let guard = self
                    .inner
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                WriterGuard { _guard: guard }
            }
        }
    } else {
        use crate::sync::SpinLock;

        pub(crate) struct WriterGate {
            inner: SpinLock,
        }

        pub(crate) struct WriterGuard<'a> {
            gate: &'a WriterGate,
        }

        impl WriterGate {
            pub(crate) const fn new() -> Self {
                Self { inner: SpinLock::new() }
            }

            pub(crate) fn lock(&self) -> WriterGuard<'_> {
                self.inner.lock();
                WriterGuard { gate: self }
            }
        }

        impl Drop for WriterGuard<'_> {
            fn drop(&mut self) {
                self.gate.inner.unlock();
            }
        }
    }
}
