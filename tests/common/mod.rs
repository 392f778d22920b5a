//! In-memory stand-in for the store, speaking the same commands and scripts
//! the adapter sends. It parses real argument lists, so argument order
//! mistakes surface as wrong results rather than passing silently.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kvns_zset::script::{self, Script};
use kvns_zset::{
    Access, Codec, Command, Dispatcher, Error, NodeId, Reply, Request, Response, Result, Route,
    ScoredSortedSet, SetOptions, StringCodec,
};

pub const NODE: &str = "memory-0";

#[derive(Clone, Copy, Debug)]
struct Member {
    score: f64,
    /// Insertion order; scan cursors walk it so removals never shift them.
    seq: u64,
}

type Set = HashMap<Vec<u8>, Member>;

#[derive(Clone, Debug)]
pub struct Logged {
    pub command: String,
    pub route: Route,
    pub args: Vec<String>,
}

#[derive(Default)]
struct State {
    sets: HashMap<Vec<u8>, Set>,
    next_seq: u64,
}

pub struct MemoryDispatcher {
    state: Mutex<State>,
    log: Mutex<Vec<Logged>>,
    scan_batch: usize,
    evals: AtomicUsize,
    /// Eval calls numbered from this one on answer with an error.
    fail_evals_from: Mutex<Option<usize>>,
}

impl MemoryDispatcher {
    pub fn new() -> Arc<Self> {
        Self::with_scan_batch(10)
    }

    pub fn with_scan_batch(scan_batch: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            log: Mutex::new(Vec::new()),
            scan_batch,
            evals: AtomicUsize::new(0),
            fail_evals_from: Mutex::new(None),
        })
    }

    pub fn fail_evals_from(&self, call: usize) {
        *self.fail_evals_from.lock().unwrap() = Some(call);
    }

    pub fn log(&self) -> Vec<Logged> {
        self.log.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.log().into_iter().map(|l| l.command).collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Members in store order with their scores.
    pub fn members(&self, key: &str) -> Vec<(String, f64)> {
        let state = self.state.lock().unwrap();
        match state.sets.get(key.as_bytes()) {
            Some(set) => sorted(set)
                .into_iter()
                .map(|(m, s)| (String::from_utf8_lossy(&m).into_owned(), s))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.state.lock().unwrap().sets.contains_key(key.as_bytes())
    }

    fn record(&self, command: String, route: &Route, args: &[Vec<u8>]) {
        self.log.lock().unwrap().push(Logged {
            command,
            route: route.clone(),
            args: args.iter().map(|a| String::from_utf8_lossy(a).into_owned()).collect(),
        });
    }

    fn response(reply: Reply) -> Result<Response> {
        Ok(Response {
            node: NodeId::new(NODE),
            reply,
        })
    }

    fn apply(&self, req: &Request) -> Reply {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let key = req.args[0].clone();
        let args = &req.args[1..];
        let reply = match req.command {
            Command::ZAdd => {
                let (nx, pairs) = match args.first() {
                    Some(flag) if flag.as_slice() == b"NX" => (true, &args[1..]),
                    _ => (false, args),
                };
                let mut added = 0;
                for pair in pairs.chunks(2) {
                    let score = num(&pair[0]);
                    let seq = state.next_seq + 1;
                    let set = state.sets.entry(key.clone()).or_default();
                    match set.get_mut(&pair[1]) {
                        Some(existing) if !nx => existing.score = score,
                        Some(_) => {}
                        None => {
                            set.insert(pair[1].clone(), Member { score, seq });
                            state.next_seq = seq;
                            added += 1;
                        }
                    }
                }
                Reply::Integer(added)
            }
            Command::ZRem => {
                let removed = match state.sets.get_mut(&key) {
                    Some(set) => args.iter().filter(|m| set.remove(*m).is_some()).count(),
                    None => 0,
                };
                Reply::Integer(removed as i64)
            }
            Command::ZRemRangeByRank => {
                let items = sorted_of(state, &key);
                let doomed = rank_slice(&items, int(&args[0]), int(&args[1]));
                remove_members(state, &key, doomed)
            }
            Command::ZRemRangeByScore => {
                let (min, max) = (bound(&args[0]), bound(&args[1]));
                let doomed: Vec<_> = sorted_of(state, &key)
                    .into_iter()
                    .filter(|(_, s)| within(*s, min, max))
                    .collect();
                remove_members(state, &key, doomed)
            }
            Command::ZCard => Reply::Integer(sorted_of(state, &key).len() as i64),
            Command::ZScore => match state.sets.get(&key).and_then(|s| s.get(&args[0])) {
                Some(m) => Reply::Bulk(fmt(m.score)),
                None => Reply::Nil,
            },
            Command::ZRank | Command::ZRevRank => {
                let mut items = sorted_of(state, &key);
                if req.command == Command::ZRevRank {
                    items.reverse();
                }
                match items.iter().position(|(m, _)| *m == args[0]) {
                    Some(i) => Reply::Integer(i as i64),
                    None => Reply::Nil,
                }
            }
            Command::ZRange => {
                let items = sorted_of(state, &key);
                let picked = rank_slice(&items, int(&args[0]), int(&args[1]));
                render(picked, args[2..].iter().any(|a| a.as_slice() == b"WITHSCORES"))
            }
            Command::ZRangeByScore | Command::ZRevRangeByScore => {
                let reversed = req.command == Command::ZRevRangeByScore;
                let (min, max) = if reversed {
                    (bound(&args[1]), bound(&args[0]))
                } else {
                    (bound(&args[0]), bound(&args[1]))
                };
                let mut items: Vec<_> = sorted_of(state, &key)
                    .into_iter()
                    .filter(|(_, s)| within(*s, min, max))
                    .collect();
                if reversed {
                    items.reverse();
                }
                let mut with_scores = false;
                let mut opts = args[2..].iter();
                while let Some(opt) = opts.next() {
                    match opt.as_slice() {
                        b"WITHSCORES" => with_scores = true,
                        b"LIMIT" => {
                            let offset = int(opts.next().unwrap()) as usize;
                            let count = int(opts.next().unwrap()) as usize;
                            items = items.into_iter().skip(offset).take(count).collect();
                        }
                        other => panic!("unexpected option {:?}", String::from_utf8_lossy(other)),
                    }
                }
                render(items, with_scores)
            }
            Command::ZIncrBy => {
                let delta = num(&args[0]);
                let seq = state.next_seq + 1;
                let set = state.sets.entry(key.clone()).or_default();
                let member = set.entry(args[1].clone()).or_insert(Member { score: 0.0, seq });
                member.score += delta;
                let score = member.score;
                if member.seq == seq {
                    state.next_seq = seq;
                }
                Reply::Bulk(fmt(score))
            }
            Command::ZScan => {
                let cursor = int(&args[0]) as u64;
                let mut count = self.scan_batch;
                if args.len() == 3 && args[1].as_slice() == b"COUNT" {
                    count = int(&args[2]) as usize;
                }
                let mut by_seq: Vec<(Vec<u8>, Member)> = state
                    .sets
                    .get(&key)
                    .map(|s| s.iter().map(|(k, v)| (k.clone(), *v)).collect())
                    .unwrap_or_default();
                by_seq.sort_by_key(|(_, m)| m.seq);
                let from = cursor.max(1);
                let remaining: Vec<_> = by_seq.into_iter().filter(|(_, m)| m.seq >= from).collect();
                let batch: Vec<_> = remaining.iter().take(count).cloned().collect();
                let next = if remaining.len() > batch.len() {
                    batch.last().map(|(_, m)| m.seq + 1).unwrap_or(0)
                } else {
                    0
                };
                let mut items = Vec::new();
                for (m, meta) in batch {
                    items.push(Reply::Bulk(m));
                    items.push(Reply::Bulk(fmt(meta.score)));
                }
                Reply::Array(vec![
                    Reply::Bulk(next.to_string().into_bytes()),
                    Reply::Array(items),
                ])
            }
            Command::Del => Reply::Integer(i64::from(state.sets.remove(&key).is_some())),
            Command::Eval => Reply::Error("ERR EVAL goes through eval()".into()),
        };
        state.sets.retain(|_, s| !s.is_empty());
        reply
    }

    fn run_script(&self, script: &Script, key: &[u8], args: &[Vec<u8>]) -> Reply {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let reply = match script.name {
            "poll" => {
                let items = sorted_of(state, key);
                let rank = int(&args[0]);
                match rank_slice(&items, rank, rank).into_iter().next() {
                    Some((member, _)) => {
                        if let Some(set) = state.sets.get_mut(key) {
                            set.remove(&member);
                        }
                        Reply::Bulk(member)
                    }
                    None => Reply::Nil,
                }
            }
            "contains_all" => {
                let set = state.sets.get(key);
                let all = args.iter().all(|a| set.is_some_and(|s| s.contains_key(a)));
                Reply::Integer(i64::from(all))
            }
            "remove_all" => {
                let removed = match state.sets.get_mut(key) {
                    Some(set) => args.iter().filter(|m| set.remove(*m).is_some()).count(),
                    None => 0,
                };
                Reply::Integer(i64::from(removed > 0))
            }
            "retain_all" => {
                let changed = match state.sets.get_mut(key) {
                    Some(set) => {
                        let before = set.len();
                        set.retain(|m, _| args.contains(m));
                        set.len() != before
                    }
                    None => false,
                };
                Reply::Integer(i64::from(changed))
            }
            other => Reply::Error(format!("NOSCRIPT unknown script {other}")),
        };
        state.sets.retain(|_, s| !s.is_empty());
        reply
    }
}

#[async_trait]
impl Dispatcher for MemoryDispatcher {
    async fn execute(&self, route: Route, _access: Access, request: Request) -> Result<Response> {
        self.record(request.command.name().to_string(), &route, &request.args);
        if let Route::Node(node) = &route {
            if node.0 != NODE {
                return Err(Error::UnknownNode(node.to_string()));
            }
        }
        Self::response(self.apply(&request))
    }

    async fn eval(
        &self,
        route: Route,
        _access: Access,
        script: &Script,
        keys: Vec<String>,
        args: Vec<Vec<u8>>,
    ) -> Result<Response> {
        self.record(format!("EVAL:{}", script.name), &route, &args);
        let call = self.evals.fetch_add(1, Ordering::SeqCst);
        if self.fail_evals_from.lock().unwrap().is_some_and(|from| call >= from) {
            return Self::response(Reply::Error("ERR injected failure".into()));
        }
        if script::by_name(script.name) != Some(script) {
            return Self::response(Reply::Error("NOSCRIPT body does not match template".into()));
        }
        assert_eq!(keys.len(), 1, "scripts take exactly one key");
        Self::response(self.run_script(script, keys[0].as_bytes(), &args))
    }
}

/// Answers every request with the same error reply.
pub struct FailingDispatcher(pub &'static str);

#[async_trait]
impl Dispatcher for FailingDispatcher {
    async fn execute(&self, _route: Route, _access: Access, _request: Request) -> Result<Response> {
        MemoryDispatcher::response(Reply::Error(self.0.to_string()))
    }

    async fn eval(
        &self,
        _route: Route,
        _access: Access,
        _script: &Script,
        _keys: Vec<String>,
        _args: Vec<Vec<u8>>,
    ) -> Result<Response> {
        MemoryDispatcher::response(Reply::Error(self.0.to_string()))
    }
}

pub fn string_set(name: &str, dispatcher: &Arc<MemoryDispatcher>) -> ScoredSortedSet<String> {
    string_set_with(name, dispatcher, SetOptions::default())
}

pub fn string_set_with(
    name: &str,
    dispatcher: &Arc<MemoryDispatcher>,
    options: SetOptions,
) -> ScoredSortedSet<String> {
    init_tracing();
    let codec: Arc<dyn Codec<String>> = Arc::new(StringCodec);
    let dispatcher: Arc<dyn Dispatcher> = dispatcher.clone();
    ScoredSortedSet::new(name, codec, dispatcher).with_options(options)
}

/// Route the adapter's warnings to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .try_init();
}

pub fn s(v: &str) -> String {
    v.to_string()
}

// ── Store helpers ─────────────────────────────────────────────────────────────

fn sorted(set: &Set) -> Vec<(Vec<u8>, f64)> {
    let mut items: Vec<_> = set.iter().map(|(m, meta)| (m.clone(), meta.score)).collect();
    items.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    items
}

fn sorted_of(state: &State, key: &[u8]) -> Vec<(Vec<u8>, f64)> {
    state.sets.get(key).map(sorted).unwrap_or_default()
}

fn rank_slice(items: &[(Vec<u8>, f64)], start: i64, end: i64) -> Vec<(Vec<u8>, f64)> {
    let len = items.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { len + end } else { end.min(len - 1) };
    if len == 0 || start > end || start >= len {
        return Vec::new();
    }
    items[start as usize..=end as usize].to_vec()
}

fn remove_members(state: &mut State, key: &[u8], doomed: Vec<(Vec<u8>, f64)>) -> Reply {
    let set = state.sets.get_mut(key);
    let mut removed = 0;
    if let Some(set) = set {
        for (m, _) in doomed {
            if set.remove(&m).is_some() {
                removed += 1;
            }
        }
    }
    Reply::Integer(removed)
}

fn render(items: Vec<(Vec<u8>, f64)>, with_scores: bool) -> Reply {
    let mut out = Vec::new();
    for (m, s) in items {
        out.push(Reply::Bulk(m));
        if with_scores {
            out.push(Reply::Bulk(fmt(s)));
        }
    }
    Reply::Array(out)
}

fn bound(arg: &[u8]) -> (f64, bool) {
    match arg.strip_prefix(b"(") {
        Some(rest) => (num(rest), false),
        None => (num(arg), true),
    }
}

fn within(score: f64, min: (f64, bool), max: (f64, bool)) -> bool {
    let above = if min.1 { score >= min.0 } else { score > min.0 };
    let below = if max.1 { score <= max.0 } else { score < max.0 };
    above && below
}

fn num(arg: &[u8]) -> f64 {
    std::str::from_utf8(arg).unwrap().parse().unwrap()
}

fn int(arg: &[u8]) -> i64 {
    std::str::from_utf8(arg).unwrap().parse().unwrap()
}

fn fmt(score: f64) -> Vec<u8> {
    kvns_zset::score::encode(score).unwrap().into_bytes()
}
