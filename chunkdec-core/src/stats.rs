use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a store's activity counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub lookups: u64,
    pub hits: u64,
    pub writers_opened: u64,
    pub writers_declined: u64,
    pub commits: u64,
    pub write_failures: u64,
}

#[derive(Debug, Default)]
pub struct StoreCounters {
    lookups: AtomicU64,
    hits: AtomicU64,
    writers_opened: AtomicU64,
    writers_declined: AtomicU64,
    commits: AtomicU64,
    write_failures: AtomicU64,
}

impl StoreCounters {
    pub fn lookup(&self, hit: bool) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn writer(&self, opened: bool) {
        if opened {
            self.writers_opened.fetch_add(1, Ordering::Relaxed);
        } else {
            self.writers_declined.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            writers_opened: self.writers_opened.load(Ordering::Relaxed),
            writers_declined: self.writers_declined.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}
