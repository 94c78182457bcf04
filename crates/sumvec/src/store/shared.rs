//! Shared access to a summary set: many readers, one appender.

use crate::codec::{self, LoadOptions};
use crate::error::Result;
use crate::store::set::{DataBatch, SummarySet};
use parking_lot::{RwLock, RwLockReadGuard};
use std::ops::Range;
use std::path::PathBuf;

/// A [`SummarySet`] behind a reader-writer lock.
///
/// Queries and analytics take the read lock and run concurrently; appends
/// take the write lock, so at most one mutation is in flight.
#[derive(Debug)]
pub struct SharedSummary {
    inner: RwLock<SummarySet>,
}

impl SharedSummary {
    /// Wraps a set.
    pub fn new(set: SummarySet) -> Self {
        Self {
            inner: RwLock::new(set),
        }
    }

    /// Acquires shared read access.
    pub fn read(&self) -> RwLockReadGuard<'_, SummarySet> {
        self.inner.read()
    }

    /// Appends a batch under the write lock.
    pub fn extend(&self, batch: DataBatch, strict_units: bool) -> Result<Range<usize>> {
        self.inner.write().extend(batch, strict_units)
    }

    /// Loads more data files into the set under the write lock.
    pub fn load_data(&self, data: &[PathBuf], options: &LoadOptions) -> Result<()> {
        codec::load_data(&mut self.inner.write(), data, options)
    }

    /// Returns the wrapped set.
    pub fn into_inner(self) -> SummarySet {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::VarKey;
    use crate::store::StepStamp;
    use chrono::DateTime;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_concurrent_readers_with_appender() {
        let mut set = SummarySet::new("CASE", DateTime::from_timestamp(0, 0).unwrap());
        set.register(VarKey::field("FOPR"), "SM3/DAY").unwrap();
        let shared = Arc::new(SharedSummary::new(set));

        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for i in 0..50u32 {
                    let mut batch = DataBatch::new();
                    batch.push(StepStamp::new(i + 1, 1, i as i64 * 10), vec![i as f64]);
                    shared.extend(batch, true).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let set = shared.read();
                        assert_eq!(set.step_count(), set.time_index().step_count());
                        if let Some(last) = set.step_count().checked_sub(1) {
                            assert_eq!(set.values().get(last, 0).unwrap(), Some(last as f64));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        let set = Arc::try_unwrap(shared).unwrap().into_inner();
        assert_eq!(set.step_count(), 50);
    }
}
