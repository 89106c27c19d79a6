use super::progress::ProgressReporter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable flag used to request cooperative cancellation of running engines.
///
/// All clones share one flag. Engines poll it between stages (and between
/// smoothing iterations), so cancellation takes effect at the next checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Clears a previous cancellation so the token can be reused for a new run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy)]
pub struct ComputeContext<'a> {
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: &'a CancellationToken,
}

impl<'a> ComputeContext<'a> {
    pub fn new(reporter: &'a ProgressReporter<'a>, cancel: &'a CancellationToken) -> Self {
        Self { reporter, cancel }
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}
