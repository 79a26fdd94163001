use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Count of calls currently executing against one host.
///
/// Cloning shares the count. Reads are plain atomic loads, so load
/// balancing never waits on a call in progress.
#[derive(Debug, Clone, Default)]
pub struct JobCounter {
    count: Arc<AtomicUsize>,
}

impl JobCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Counts one job until the returned guard is dropped.
    pub fn enter(&self) -> JobGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        JobGuard {
            count: self.count.clone(),
        }
    }
}

/// Decrements its counter exactly once, on drop.
///
/// Not `Clone`; moving the guard (for instance into a background task)
/// moves the obligation with it.
#[derive(Debug)]
#[must_use = "the job stops being counted as soon as the guard is dropped"]
pub struct JobGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}
