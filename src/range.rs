//! Query shapes and their wire form.
//!
//! Rank ranges map onto `ZRANGE`; score ranges onto `ZRANGEBYSCORE` or, when
//! reversed, `ZREVRANGEBYSCORE`, which takes its boundaries max-first.

use crate::codec::Codec;
use crate::command::{Command, Request};
use crate::error::{Error, Result};
use crate::resp::Reply;
use crate::score;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// Inclusive rank bounds; negative values count from the end (`-1` is last).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankRange {
    pub start: i64,
    pub end: i64,
}

impl RankRange {
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub const fn first() -> Self {
        Self::new(0, 0)
    }

    pub const fn last() -> Self {
        Self::new(-1, -1)
    }

    pub const fn all() -> Self {
        Self::new(0, -1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreBound {
    pub score: f64,
    pub inclusive: bool,
}

impl ScoreBound {
    pub const fn inclusive(score: f64) -> Self {
        Self { score, inclusive: true }
    }

    pub const fn exclusive(score: f64) -> Self {
        Self { score, inclusive: false }
    }

    fn encode(&self) -> Result<String> {
        score::encode_boundary(self.score, self.inclusive)
    }
}

/// Score interval, always given low end first; reversed queries swap the
/// order on the wire themselves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreRange {
    pub start: ScoreBound,
    pub end: ScoreBound,
}

impl ScoreRange {
    pub const fn new(start: f64, start_inclusive: bool, end: f64, end_inclusive: bool) -> Self {
        Self {
            start: ScoreBound { score: start, inclusive: start_inclusive },
            end: ScoreBound { score: end, inclusive: end_inclusive },
        }
    }

    /// `[start, end]`
    pub const fn closed(start: f64, end: f64) -> Self {
        Self::new(start, true, end, true)
    }

    /// Every score, infinities included.
    pub const fn all() -> Self {
        Self::closed(f64::NEG_INFINITY, f64::INFINITY)
    }
}

/// `LIMIT offset count`, applied after the score selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limit {
    pub offset: u64,
    pub count: u64,
}

impl Limit {
    pub const fn new(offset: u64, count: u64) -> Self {
        Self { offset, count }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredEntry<V> {
    pub value: V,
    pub score: f64,
}

// ── Request builders ──────────────────────────────────────────────────────────

pub fn by_rank(key: &str, range: RankRange, with_scores: bool) -> Request {
    let mut req = Request::new(Command::ZRange, key)
        .arg(range.start.to_string())
        .arg(range.end.to_string());
    if with_scores {
        req.push("WITHSCORES");
    }
    req
}

pub fn by_score(
    key: &str,
    range: &ScoreRange,
    order: Order,
    limit: Option<Limit>,
    with_scores: bool,
) -> Result<Request> {
    let start = range.start.encode()?;
    let end = range.end.encode()?;
    let mut req = match order {
        Order::Ascending => Request::new(Command::ZRangeByScore, key).arg(start).arg(end),
        Order::Descending => Request::new(Command::ZRevRangeByScore, key).arg(end).arg(start),
    };
    if with_scores {
        req.push("WITHSCORES");
    }
    if let Some(limit) = limit {
        req.push("LIMIT");
        req.push(limit.offset.to_string());
        req.push(limit.count.to_string());
    }
    Ok(req)
}

pub fn remove_by_rank(key: &str, range: RankRange) -> Request {
    Request::new(Command::ZRemRangeByRank, key)
        .arg(range.start.to_string())
        .arg(range.end.to_string())
}

pub fn remove_by_score(key: &str, range: &ScoreRange) -> Result<Request> {
    Ok(Request::new(Command::ZRemRangeByScore, key)
        .arg(range.start.encode()?)
        .arg(range.end.encode()?))
}

// ── Reply decoding ────────────────────────────────────────────────────────────

pub fn values<V>(reply: Reply, codec: &dyn Codec<V>) -> Result<Vec<V>> {
    reply
        .into_array()?
        .into_iter()
        .map(|item| codec.decode(&item.into_bytes()?))
        .collect()
}

/// Decode a `WITHSCORES` reply: either a flat `member score ...` list
/// (RESP2) or a list of `[member, score]` pairs (RESP3).
pub fn entries<V>(reply: Reply, codec: &dyn Codec<V>) -> Result<Vec<ScoredEntry<V>>> {
    let items = reply.into_array()?;
    if items.iter().all(|i| matches!(i, Reply::Array(_))) && !items.is_empty() {
        return items
            .into_iter()
            .map(|pair| {
                let mut pair = pair.into_array()?.into_iter();
                match (pair.next(), pair.next(), pair.next()) {
                    (Some(member), Some(score), None) => entry(member, score, codec),
                    _ => Err(Error::protocol("scored pair must have two elements")),
                }
            })
            .collect();
    }
    if items.len() % 2 != 0 {
        return Err(Error::protocol("WITHSCORES reply has an odd number of items"));
    }
    let mut out = Vec::with_capacity(items.len() / 2);
    let mut it = items.into_iter();
    while let (Some(member), Some(score)) = (it.next(), it.next()) {
        out.push(entry(member, score, codec)?);
    }
    Ok(out)
}

fn entry<V>(member: Reply, score: Reply, codec: &dyn Codec<V>) -> Result<ScoredEntry<V>> {
    Ok(ScoredEntry {
        value: codec.decode(&member.into_bytes()?)?,
        score: score.into_score()?,
    })
}

/// First element of a single-element range, if any.
pub fn first_value<V>(reply: Reply, codec: &dyn Codec<V>) -> Result<Option<V>> {
    match reply.into_array()?.into_iter().next() {
        Some(item) => codec.decode(&item.into_bytes()?).map(Some),
        None => Ok(None),
    }
}
