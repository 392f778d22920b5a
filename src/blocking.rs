//! Blocking mirror of [`ScoredSortedSet`].
//!
//! Each method drives the async operation to completion on a shared tokio
//! runtime. Calling these from inside an async context panics, as any
//! `Runtime::block_on` does; use the async set there.

use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::error::Result;
use crate::iter::ScanIter;
use crate::range::{Limit, ScoreRange, ScoredEntry};
use crate::set::ScoredSortedSet;

pub struct BlockingScoredSortedSet<V> {
    inner: ScoredSortedSet<V>,
    runtime: Arc<Runtime>,
}

impl<V> Clone for BlockingScoredSortedSet<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl<V> ScoredSortedSet<V> {
    pub fn blocking(self, runtime: Arc<Runtime>) -> BlockingScoredSortedSet<V> {
        BlockingScoredSortedSet::new(self, runtime)
    }
}

impl<V> BlockingScoredSortedSet<V> {
    pub fn new(inner: ScoredSortedSet<V>, runtime: Arc<Runtime>) -> Self {
        Self { inner, runtime }
    }

    /// The async set behind this facade.
    pub fn as_async(&self) -> &ScoredSortedSet<V> {
        &self.inner
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn add(&self, score: f64, value: &V) -> Result<bool> {
        self.runtime.block_on(self.inner.add(score, value))
    }

    pub fn try_add(&self, score: f64, value: &V) -> Result<bool> {
        self.runtime.block_on(self.inner.try_add(score, value))
    }

    pub fn add_all(&self, entries: &[(V, f64)]) -> Result<u64> {
        self.runtime.block_on(self.inner.add_all(entries))
    }

    pub fn remove(&self, value: &V) -> Result<bool> {
        self.runtime.block_on(self.inner.remove(value))
    }

    pub fn remove_range_by_rank(&self, start: i64, end: i64) -> Result<u64> {
        self.runtime.block_on(self.inner.remove_range_by_rank(start, end))
    }

    pub fn remove_range_by_score(&self, range: &ScoreRange) -> Result<u64> {
        self.runtime.block_on(self.inner.remove_range_by_score(range))
    }

    pub fn clear(&self) -> Result<bool> {
        self.runtime.block_on(self.inner.clear())
    }

    pub fn add_score(&self, value: &V, delta: f64) -> Result<f64> {
        self.runtime.block_on(self.inner.add_score(value, delta))
    }

    pub fn size(&self) -> Result<u64> {
        self.runtime.block_on(self.inner.size())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.runtime.block_on(self.inner.is_empty())
    }

    pub fn contains(&self, value: &V) -> Result<bool> {
        self.runtime.block_on(self.inner.contains(value))
    }

    pub fn score(&self, value: &V) -> Result<Option<f64>> {
        self.runtime.block_on(self.inner.score(value))
    }

    pub fn rank(&self, value: &V) -> Result<Option<u64>> {
        self.runtime.block_on(self.inner.rank(value))
    }

    pub fn rev_rank(&self, value: &V) -> Result<Option<u64>> {
        self.runtime.block_on(self.inner.rev_rank(value))
    }

    pub fn first(&self) -> Result<Option<V>> {
        self.runtime.block_on(self.inner.first())
    }

    pub fn last(&self) -> Result<Option<V>> {
        self.runtime.block_on(self.inner.last())
    }

    pub fn value_range(&self, start: i64, end: i64) -> Result<Vec<V>> {
        self.runtime.block_on(self.inner.value_range(start, end))
    }

    pub fn entry_range(&self, start: i64, end: i64) -> Result<Vec<ScoredEntry<V>>> {
        self.runtime.block_on(self.inner.entry_range(start, end))
    }

    pub fn value_range_by_score(&self, range: &ScoreRange, limit: Option<Limit>) -> Result<Vec<V>> {
        self.runtime.block_on(self.inner.value_range_by_score(range, limit))
    }

    pub fn value_range_by_score_reversed(
        &self,
        range: &ScoreRange,
        limit: Option<Limit>,
    ) -> Result<Vec<V>> {
        self.runtime
            .block_on(self.inner.value_range_by_score_reversed(range, limit))
    }

    pub fn entry_range_by_score(
        &self,
        range: &ScoreRange,
        limit: Option<Limit>,
    ) -> Result<Vec<ScoredEntry<V>>> {
        self.runtime.block_on(self.inner.entry_range_by_score(range, limit))
    }

    pub fn entry_range_by_score_reversed(
        &self,
        range: &ScoreRange,
        limit: Option<Limit>,
    ) -> Result<Vec<ScoredEntry<V>>> {
        self.runtime
            .block_on(self.inner.entry_range_by_score_reversed(range, limit))
    }

    pub fn read_all(&self) -> Result<Vec<V>> {
        self.runtime.block_on(self.inner.read_all())
    }

    pub fn poll_first(&self) -> Result<Option<V>> {
        self.runtime.block_on(self.inner.poll_first())
    }

    pub fn poll_last(&self) -> Result<Option<V>> {
        self.runtime.block_on(self.inner.poll_last())
    }

    pub fn contains_all(&self, values: &[V]) -> Result<bool> {
        self.runtime.block_on(self.inner.contains_all(values))
    }

    /// See [`ScoredSortedSet::remove_all`] for partial-failure semantics.
    pub fn remove_all(&self, values: &[V]) -> Result<bool> {
        self.runtime.block_on(self.inner.remove_all(values))
    }

    pub fn retain_all(&self, values: &[V]) -> Result<bool> {
        self.runtime.block_on(self.inner.retain_all(values))
    }

    pub fn iter(&self) -> BlockingScanIter<V> {
        BlockingScanIter {
            inner: self.inner.iter(),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

/// `Iterator` over a [`ScanIter`]; each item is a member or the error that
/// stopped the scan.
pub struct BlockingScanIter<V> {
    inner: ScanIter<V>,
    runtime: Arc<Runtime>,
}

impl<V> BlockingScanIter<V> {
    /// Remove the member most recently yielded.
    pub fn remove(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.remove())
    }
}

impl<V> Iterator for BlockingScanIter<V> {
    type Item = Result<V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.inner.next()).transpose()
    }
}
