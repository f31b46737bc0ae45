//! Live candidate set, keyed by descriptor id

use std::collections::HashMap;
use std::sync::Arc;

use super::ProxyDescriptor;

/// Which verification a failure or success came from
///
/// Each kind keeps its own consecutive count, so a proxy that still accepts TCP connects
/// but fails every reachability check is evicted all the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// TCP connect during latency probing
    Probe,
    /// Reachability check through the activated engine
    Check,
}

/// Result of recording a failure against a pool member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Threshold reached, descriptor removed
    Evicted,
    /// Still in the pool with this many consecutive failures of that kind
    Retained { failures: u32 },
    /// Id was not in the pool
    Unknown,
}

/// Counts of a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub replaced: usize,
}

#[derive(Default)]
struct FailureCounts {
    probe: u32,
    check: u32,
}

impl FailureCounts {
    fn get_mut(&mut self, kind: FailureKind) -> &mut u32 {
        match kind {
            FailureKind::Probe => &mut self.probe,
            FailureKind::Check => &mut self.check,
        }
    }
}

struct PoolEntry {
    descriptor: Arc<ProxyDescriptor>,
    failures: FailureCounts,
}

/// Mapping from descriptor id to descriptor
///
/// Only mutated by [`ProxyPool::merge`] and by eviction after
/// `max_consecutive_failures` failures of one kind in a row.
pub struct ProxyPool {
    entries: HashMap<String, PoolEntry>,
    max_consecutive_failures: u32,
}

impl ProxyPool {
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            entries: HashMap::new(),
            max_consecutive_failures: max_consecutive_failures.max(1),
        }
    }

    /// Union new descriptors into the pool; new entries win id collisions
    pub fn merge<I>(&mut self, descriptors: I) -> MergeStats
    where
        I: IntoIterator<Item = ProxyDescriptor>,
    {
        let mut stats = MergeStats::default();
        for descriptor in descriptors {
            let id = descriptor.id().to_string();
            let entry = PoolEntry {
                descriptor: Arc::new(descriptor),
                failures: FailureCounts::default(),
            };
            if self.entries.insert(id, entry).is_some() {
                stats.replaced += 1;
            } else {
                stats.added += 1;
            }
        }
        stats
    }

    pub fn get(&self, id: &str) -> Option<Arc<ProxyDescriptor>> {
        self.entries.get(id).map(|e| e.descriptor.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every member, ordered by id
    pub fn descriptors(&self) -> Vec<Arc<ProxyDescriptor>> {
        let mut all: Vec<_> = self.entries.values().map(|e| e.descriptor.clone()).collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    pub fn failures(&self, id: &str, kind: FailureKind) -> Option<u32> {
        self.entries.get(id).map(|e| match kind {
            FailureKind::Probe => e.failures.probe,
            FailureKind::Check => e.failures.check,
        })
    }

    /// Reset the consecutive count of `kind`; the other kind is left alone
    pub fn record_success(&mut self, id: &str, kind: FailureKind) {
        if let Some(entry) = self.entries.get_mut(id) {
            *entry.failures.get_mut(kind) = 0;
        }
    }

    pub fn record_failure(&mut self, id: &str, kind: FailureKind) -> FailureOutcome {
        let Some(entry) = self.entries.get_mut(id) else {
            return FailureOutcome::Unknown;
        };

        let count = entry.failures.get_mut(kind);
        *count += 1;
        let failures = *count;
        if failures >= self.max_consecutive_failures {
            self.entries.remove(id);
            FailureOutcome::Evicted
        } else {
            FailureOutcome::Retained { failures }
        }
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new(1)
    }
}
