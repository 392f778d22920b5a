use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::codec::Codec;
use crate::command::{Access, Command, Request};
use crate::config::{Config, DEFAULT_REMOVE_BATCH_SIZE};
use crate::dispatch::{Dispatcher, Response, Route};
use crate::error::{Error, Result};
use crate::iter::ScanIter;
use crate::range::{self, Limit, Order, RankRange, ScoreRange, ScoredEntry};
use crate::resp::Reply;
use crate::score;
use crate::script::{self, Script};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetOptions {
    /// Candidates per `remove_all` script invocation.
    pub remove_batch_size: usize,
    /// `COUNT` hint sent with every `ZSCAN`.
    pub scan_count: Option<usize>,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            remove_batch_size: DEFAULT_REMOVE_BATCH_SIZE,
            scan_count: None,
        }
    }
}

impl From<&Config> for SetOptions {
    fn from(config: &Config) -> Self {
        Self {
            remove_batch_size: config.remove_batch_size,
            scan_count: config.scan_count,
        }
    }
}

/// A sorted set living on the store under `name`.
///
/// The handle holds no element state; cloning it is cheap and clones may be
/// used concurrently. Members are located by their encoded bytes, so the
/// codec must encode equal values identically.
pub struct ScoredSortedSet<V> {
    name: String,
    codec: Arc<dyn Codec<V>>,
    dispatcher: Arc<dyn Dispatcher>,
    options: SetOptions,
}

impl<V> Clone for ScoredSortedSet<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            codec: Arc::clone(&self.codec),
            dispatcher: Arc::clone(&self.dispatcher),
            options: self.options,
        }
    }
}

impl<V> std::fmt::Debug for ScoredSortedSet<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoredSortedSet")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<V> ScoredSortedSet<V> {
    pub fn new(
        name: impl Into<String>,
        codec: Arc<dyn Codec<V>>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            name: name.into(),
            codec,
            dispatcher,
            options: SetOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SetOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> SetOptions {
        self.options
    }

    fn route(&self) -> Route {
        Route::Key(self.name.clone())
    }

    fn encode(&self, value: &V) -> Result<Vec<u8>> {
        self.codec.encode(value)
    }

    fn encode_all(&self, values: &[V]) -> Result<Vec<Vec<u8>>> {
        values.iter().map(|v| self.codec.encode(v)).collect()
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> Result<V> {
        self.codec.decode(bytes)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Send one command and turn an error reply into `Error::Remote`.
    pub(crate) async fn run(&self, route: Route, request: Request) -> Result<Response> {
        let command = request.command;
        let start = Instant::now();
        let result = self
            .dispatcher
            .execute(route, command.access(), request)
            .await
            .and_then(|resp| {
                Ok(Response {
                    node: resp.node,
                    reply: resp.reply.into_result()?,
                })
            });
        self.record(command.name(), start, result.as_ref().err());
        result
    }

    async fn call(&self, request: Request) -> Result<Reply> {
        Ok(self.run(self.route(), request).await?.reply)
    }

    async fn eval(&self, script: &'static Script, access: Access, args: Vec<Vec<u8>>) -> Result<Reply> {
        let start = Instant::now();
        let result = self
            .dispatcher
            .eval(self.route(), access, script, vec![self.name.clone()], args)
            .await
            .and_then(|resp| resp.reply.into_result());
        self.record(script.name, start, result.as_ref().err());
        result
    }

    fn record(&self, command: &'static str, start: Instant, error: Option<&Error>) {
        metrics::histogram!("kvns_zset_command_duration_seconds", "command" => command)
            .record(start.elapsed().as_secs_f64());
        match error {
            None => debug!(key = %self.name, command, "ok"),
            Some(e) => {
                metrics::counter!("kvns_zset_command_errors_total", "command" => command).increment(1);
                warn!(key = %self.name, command, error = %e, "command failed");
            }
        }
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Add `value` or update its score. True when the member is new.
    pub async fn add(&self, score: f64, value: &V) -> Result<bool> {
        let req = Request::new(Command::ZAdd, &self.name)
            .arg(score::encode(score)?)
            .arg(self.encode(value)?);
        Ok(self.call(req).await?.into_count()? > 0)
    }

    /// Add `value` only if absent; an existing member keeps its score.
    pub async fn try_add(&self, score: f64, value: &V) -> Result<bool> {
        let req = Request::new(Command::ZAdd, &self.name)
            .arg("NX")
            .arg(score::encode(score)?)
            .arg(self.encode(value)?);
        Ok(self.call(req).await?.into_count()? > 0)
    }

    /// Add or update many members in one request. Returns how many were new.
    pub async fn add_all(&self, entries: &[(V, f64)]) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut req = Request::new(Command::ZAdd, &self.name);
        for (value, score) in entries {
            req.push(score::encode(*score)?);
            req.push(self.encode(value)?);
        }
        self.call(req).await?.into_count()
    }

    pub async fn remove(&self, value: &V) -> Result<bool> {
        let member = self.encode(value)?;
        self.remove_raw(member).await
    }

    pub(crate) async fn remove_raw(&self, member: Vec<u8>) -> Result<bool> {
        let req = Request::new(Command::ZRem, &self.name).arg(member);
        Ok(self.call(req).await?.into_count()? > 0)
    }

    pub async fn remove_range_by_rank(&self, start: i64, end: i64) -> Result<u64> {
        let req = range::remove_by_rank(&self.name, RankRange::new(start, end));
        self.call(req).await?.into_count()
    }

    pub async fn remove_range_by_score(&self, range: &ScoreRange) -> Result<u64> {
        let req = range::remove_by_score(&self.name, range)?;
        self.call(req).await?.into_count()
    }

    /// Delete the whole set. True when it existed.
    pub async fn clear(&self) -> Result<bool> {
        let req = Request::new(Command::Del, &self.name);
        Ok(self.call(req).await?.into_count()? > 0)
    }

    /// Add `delta` to the member's score (creating it at `delta` if absent)
    /// and return the new score.
    pub async fn add_score(&self, value: &V, delta: f64) -> Result<f64> {
        let req = Request::new(Command::ZIncrBy, &self.name)
            .arg(score::encode(delta)?)
            .arg(self.encode(value)?);
        self.call(req).await?.into_score()
    }

    // ── Point reads ───────────────────────────────────────────────────────────

    pub async fn size(&self) -> Result<u64> {
        self.call(Request::new(Command::ZCard, &self.name)).await?.into_count()
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.size().await? == 0)
    }

    pub async fn contains(&self, value: &V) -> Result<bool> {
        Ok(self.score(value).await?.is_some())
    }

    pub async fn score(&self, value: &V) -> Result<Option<f64>> {
        let req = Request::new(Command::ZScore, &self.name).arg(self.encode(value)?);
        self.call(req).await?.into_optional_score()
    }

    /// Zero-based ascending rank.
    pub async fn rank(&self, value: &V) -> Result<Option<u64>> {
        let req = Request::new(Command::ZRank, &self.name).arg(self.encode(value)?);
        self.call(req).await?.into_optional_rank()
    }

    /// Zero-based rank counted from the highest score.
    pub async fn rev_rank(&self, value: &V) -> Result<Option<u64>> {
        let req = Request::new(Command::ZRevRank, &self.name).arg(self.encode(value)?);
        self.call(req).await?.into_optional_rank()
    }

    // ── Ranges ────────────────────────────────────────────────────────────────

    pub async fn first(&self) -> Result<Option<V>> {
        let reply = self.call(range::by_rank(&self.name, RankRange::first(), false)).await?;
        range::first_value(reply, self.codec.as_ref())
    }

    pub async fn last(&self) -> Result<Option<V>> {
        let reply = self.call(range::by_rank(&self.name, RankRange::last(), false)).await?;
        range::first_value(reply, self.codec.as_ref())
    }

    pub async fn value_range(&self, start: i64, end: i64) -> Result<Vec<V>> {
        let reply = self
            .call(range::by_rank(&self.name, RankRange::new(start, end), false))
            .await?;
        range::values(reply, self.codec.as_ref())
    }

    pub async fn entry_range(&self, start: i64, end: i64) -> Result<Vec<ScoredEntry<V>>> {
        let reply = self
            .call(range::by_rank(&self.name, RankRange::new(start, end), true))
            .await?;
        range::entries(reply, self.codec.as_ref())
    }

    pub async fn value_range_by_score(&self, range: &ScoreRange, limit: Option<Limit>) -> Result<Vec<V>> {
        let req = range::by_score(&self.name, range, Order::Ascending, limit, false)?;
        range::values(self.call(req).await?, self.codec.as_ref())
    }

    /// Highest scores first; `range` is still given low end first.
    pub async fn value_range_by_score_reversed(
        &self,
        range: &ScoreRange,
        limit: Option<Limit>,
    ) -> Result<Vec<V>> {
        let req = range::by_score(&self.name, range, Order::Descending, limit, false)?;
        range::values(self.call(req).await?, self.codec.as_ref())
    }

    pub async fn entry_range_by_score(
        &self,
        range: &ScoreRange,
        limit: Option<Limit>,
    ) -> Result<Vec<ScoredEntry<V>>> {
        let req = range::by_score(&self.name, range, Order::Ascending, limit, true)?;
        range::entries(self.call(req).await?, self.codec.as_ref())
    }

    pub async fn entry_range_by_score_reversed(
        &self,
        range: &ScoreRange,
        limit: Option<Limit>,
    ) -> Result<Vec<ScoredEntry<V>>> {
        let req = range::by_score(&self.name, range, Order::Descending, limit, true)?;
        range::entries(self.call(req).await?, self.codec.as_ref())
    }

    /// Every member in ascending order.
    pub async fn read_all(&self) -> Result<Vec<V>> {
        self.value_range(0, -1).await
    }

    // ── Atomic composites ─────────────────────────────────────────────────────

    /// Remove and return the lowest-scored member.
    pub async fn poll_first(&self) -> Result<Option<V>> {
        self.poll(RankRange::first()).await
    }

    /// Remove and return the highest-scored member.
    pub async fn poll_last(&self) -> Result<Option<V>> {
        self.poll(RankRange::last()).await
    }

    async fn poll(&self, rank: RankRange) -> Result<Option<V>> {
        let args = vec![rank.start.to_string().into_bytes()];
        match self.eval(&script::POLL, Access::Write, args).await?.into_optional_bytes()? {
            Some(bytes) => self.decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// True when every value is a member. Vacuously true for no values.
    pub async fn contains_all(&self, values: &[V]) -> Result<bool> {
        if values.is_empty() {
            return Ok(true);
        }
        let args = self.encode_all(values)?;
        self.eval(&script::CONTAINS_ALL, Access::Read, args).await?.into_bool()
    }

    /// Remove every given value; true when anything was removed.
    ///
    /// Values are sent `remove_batch_size` at a time, one script per chunk.
    /// Each chunk is atomic; the sequence of chunks is not. If a chunk fails
    /// after earlier ones succeeded, the earlier removals stay applied and the
    /// error is `Error::PartialBatch`.
    pub async fn remove_all(&self, values: &[V]) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        let mut pending = self.encode_all(values)?;
        let batch = self.options.remove_batch_size.max(1);
        let total_chunks = pending.len().div_ceil(batch);
        let mut removed_any = false;
        let mut applied_chunks = 0;
        while !pending.is_empty() {
            let rest = pending.split_off(pending.len().min(batch));
            let chunk = std::mem::replace(&mut pending, rest);
            let outcome = self
                .eval(&script::REMOVE_ALL, Access::Write, chunk)
                .await
                .and_then(Reply::into_bool);
            match outcome {
                Ok(removed) => {
                    removed_any |= removed;
                    applied_chunks += 1;
                }
                Err(source) if applied_chunks == 0 => return Err(source),
                Err(source) => {
                    warn!(
                        key = %self.name,
                        applied_chunks,
                        total_chunks,
                        "remove_all failed part way, earlier chunks stay applied"
                    );
                    return Err(Error::PartialBatch {
                        applied_chunks,
                        total_chunks,
                        removed_any,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(removed_any)
    }

    /// Remove every member that is not among `values`; true when anything
    /// was removed. With no values this empties the set.
    pub async fn retain_all(&self, values: &[V]) -> Result<bool> {
        let args = self.encode_all(values)?;
        self.eval(&script::RETAIN_ALL, Access::Write, args).await?.into_bool()
    }

    // ── Iteration ─────────────────────────────────────────────────────────────

    /// A fresh scan over every member. Not a snapshot: members present for
    /// the whole scan are seen at least once.
    pub fn iter(&self) -> ScanIter<V> {
        ScanIter::new(self.clone())
    }
}
