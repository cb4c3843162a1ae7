use std::sync::atomic::{AtomicBool, Ordering};

/// Holds a single-flight flag for as long as it lives.
///
/// The flag is cleared on drop, so it is released on success, on error,
/// and when the owning future is dropped mid-await.
pub(crate) struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    /// Set `flag` if it is clear. Returns `None` when it is already held.
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
