use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Running file counts per package, shared by every task of a run.
///
/// Cloning hands out another reference to the same table. Counts only ever
/// grow, nothing is removed.
#[derive(Debug, Clone, Default)]
pub struct PackageCounts {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    counts: Mutex<HashMap<String, u64>>,
    skipped: AtomicU64,
}

impl PackageCounts {
    pub fn new() -> Self {
        PackageCounts::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        // a panicking writer can't leave a half applied increment behind
        self.inner
            .counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn increment(&self, package: &str) {
        let mut counts = self.lock();
        if let Some(count) = counts.get_mut(package) {
            *count += 1;
        } else {
            counts.insert(package.to_string(), 1);
        }
    }

    /// Add a partial table, usually the result of one batch.
    pub fn merge<I, K>(&self, partial: I)
    where
        I: IntoIterator<Item = (K, u64)>,
        K: AsRef<str>,
    {
        let mut counts = self.lock();
        for (package, n) in partial {
            let package = package.as_ref();
            if let Some(count) = counts.get_mut(package) {
                *count += n;
            } else {
                counts.insert(package.to_string(), n);
            }
        }
    }

    pub fn add_skipped(&self, lines: u64) {
        self.inner.skipped.fetch_add(lines, Ordering::Relaxed);
    }

    /// Number of malformed lines that were not counted.
    pub fn skipped(&self) -> u64 {
        self.inner.skipped.load(Ordering::Relaxed)
    }

    pub fn get(&self, package: &str) -> Option<u64> {
        self.lock().get(package).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current table, only meaningful once a run has finished.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.lock().clone()
    }
}
