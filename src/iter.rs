use std::collections::VecDeque;

use crate::command::{Command, Request};
use crate::dispatch::{NodeId, Route};
use crate::error::{Error, Result};
use crate::resp::Reply;
use crate::set::ScoredSortedSet;

#[derive(Clone, Debug, PartialEq, Eq)]
enum ScanState {
    NotStarted,
    /// Cursors are only meaningful on the node that issued them.
    Scanning { node: NodeId, cursor: u64 },
    Exhausted,
}

/// Single-pass iteration over a set with `ZSCAN`.
///
/// Members are fetched a batch at a time and yielded one per `next()`. The
/// set may change during the scan; members present throughout are yielded at
/// least once, others may or may not be.
///
/// A failed fetch ends the scan: `next()` returns that error once and `None`
/// afterwards.
pub struct ScanIter<V> {
    set: ScoredSortedSet<V>,
    state: ScanState,
    batch: VecDeque<Vec<u8>>,
    /// Encoded form of the last yielded member, for `remove()`.
    current: Option<Vec<u8>>,
}

impl<V> ScanIter<V> {
    pub(crate) fn new(set: ScoredSortedSet<V>) -> Self {
        Self {
            set,
            state: ScanState::NotStarted,
            batch: VecDeque::new(),
            current: None,
        }
    }

    pub async fn next(&mut self) -> Result<Option<V>> {
        loop {
            if let Some(raw) = self.batch.pop_front() {
                let value = self.set.decode(&raw)?;
                self.current = Some(raw);
                return Ok(Some(value));
            }
            let (route, cursor) = match &self.state {
                ScanState::NotStarted => (Route::Key(self.set.name().to_owned()), 0),
                ScanState::Scanning { node, cursor } => (Route::Node(node.clone()), *cursor),
                ScanState::Exhausted => return Ok(None),
            };
            if let Err(e) = self.fetch(route, cursor).await {
                self.state = ScanState::Exhausted;
                return Err(e);
            }
        }
    }

    async fn fetch(&mut self, route: Route, cursor: u64) -> Result<()> {
        let mut req = Request::new(Command::ZScan, self.set.name()).arg(cursor.to_string());
        if let Some(count) = self.set.options().scan_count {
            req.push("COUNT");
            req.push(count.to_string());
        }
        let resp = self.set.run(route, req).await?;
        let (next, members) = parse_scan(resp.reply)?;
        self.batch.extend(members);
        self.state = if next == 0 {
            ScanState::Exhausted
        } else {
            ScanState::Scanning {
                node: resp.node,
                cursor: next,
            }
        };
        Ok(())
    }

    /// Remove the member most recently returned by `next()`. The scan
    /// position is unaffected.
    pub async fn remove(&mut self) -> Result<bool> {
        let member = self
            .current
            .take()
            .ok_or(Error::IllegalState("remove() without a current element"))?;
        self.set.remove_raw(member).await
    }

    /// True once the store reported the end of the scan and the last batch
    /// has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.state == ScanState::Exhausted && self.batch.is_empty()
    }
}

/// `[cursor, [member, score, member, score, ...]]` into the next cursor and
/// the members.
fn parse_scan(reply: Reply) -> Result<(u64, Vec<Vec<u8>>)> {
    let mut parts = reply.into_array()?.into_iter();
    let (Some(cursor), Some(items), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::protocol("scan reply must have two elements"));
    };
    let cursor = cursor.into_cursor()?;
    let items = items.into_array()?;
    if items.len() % 2 != 0 {
        return Err(Error::protocol("scan batch has an odd number of items"));
    }
    let members = items
        .into_iter()
        .step_by(2)
        .map(Reply::into_bytes)
        .collect::<Result<Vec<_>>>()?;
    Ok((cursor, members))
}
