//! RESP framing: commands out, replies in.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::config::{
    Config, DEFAULT_MAX_REPLY_ARGS, DEFAULT_MAX_REPLY_BULK_LEN, DEFAULT_MAX_REPLY_LINE_LEN,
};
use crate::error::{Error, Result};
use crate::score;

/// Nested aggregates deeper than this are rejected rather than recursed into.
const MAX_REPLY_DEPTH: usize = 32;

#[derive(Clone, Copy, Debug)]
pub struct RespLimits {
    pub max_array_len: usize,
    pub max_bulk_len: usize,
    pub max_line_len: usize,
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            max_array_len: DEFAULT_MAX_REPLY_ARGS,
            max_bulk_len: DEFAULT_MAX_REPLY_BULK_LEN,
            max_line_len: DEFAULT_MAX_REPLY_LINE_LEN,
        }
    }
}

impl From<&Config> for RespLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_array_len: config.max_reply_args,
            max_bulk_len: config.max_reply_bulk_len,
            max_line_len: config.max_reply_line_len,
        }
    }
}

/// A decoded RESP2/RESP3 reply.
///
/// RESP3 sets, maps and pushes are flattened into `Array`; big numbers and
/// verbatim strings become `Bulk`.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Status(String),
    Error(String),
    Integer(i64),
    Bulk(Vec<u8>),
    Array(Vec<Reply>),
    Double(f64),
    Boolean(bool),
    Nil,
}

impl Reply {
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Status(_) => "status",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::Bulk(_) => "bulk",
            Reply::Array(_) => "array",
            Reply::Double(_) => "double",
            Reply::Boolean(_) => "boolean",
            Reply::Nil => "nil",
        }
    }

    /// Turn an error reply into `Error::Remote`.
    pub fn into_result(self) -> Result<Reply> {
        match self {
            Reply::Error(msg) => Err(Error::Remote(msg)),
            other => Ok(other),
        }
    }

    pub fn into_integer(self) -> Result<i64> {
        match self {
            Reply::Integer(n) => Ok(n),
            Reply::Bulk(text) => std::str::from_utf8(&text)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::protocol("bulk reply is not an integer")),
            other => Err(unexpected("integer", &other)),
        }
    }

    pub fn into_count(self) -> Result<u64> {
        let n = self.into_integer()?;
        u64::try_from(n).map_err(|_| Error::protocol(format!("negative count {n}")))
    }

    /// Scripts answer booleans as `1`/`0`, Lua `false` arrives as nil.
    pub fn into_bool(self) -> Result<bool> {
        match self {
            Reply::Integer(n) => Ok(n != 0),
            Reply::Boolean(b) => Ok(b),
            Reply::Nil => Ok(false),
            other => Err(unexpected("boolean", &other)),
        }
    }

    pub fn into_optional_bytes(self) -> Result<Option<Vec<u8>>> {
        match self {
            Reply::Bulk(bytes) => Ok(Some(bytes)),
            Reply::Status(s) => Ok(Some(s.into_bytes())),
            Reply::Nil => Ok(None),
            other => Err(unexpected("bulk", &other)),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        self.into_optional_bytes()?
            .ok_or_else(|| Error::protocol("expected bulk, got nil"))
    }

    pub fn into_array(self) -> Result<Vec<Reply>> {
        match self {
            Reply::Array(items) => Ok(items),
            Reply::Nil => Ok(Vec::new()),
            other => Err(unexpected("array", &other)),
        }
    }

    pub fn into_optional_score(self) -> Result<Option<f64>> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Double(d) if !d.is_nan() => Ok(Some(d)),
            Reply::Bulk(text) => score::decode(&text).map(Some),
            Reply::Integer(n) => Ok(Some(n as f64)),
            other => Err(unexpected("score", &other)),
        }
    }

    pub fn into_score(self) -> Result<f64> {
        self.into_optional_score()?
            .ok_or_else(|| Error::protocol("expected score, got nil"))
    }

    /// Scan cursors are unsigned 64-bit and usually arrive as bulk text.
    pub fn into_cursor(self) -> Result<u64> {
        match self {
            Reply::Integer(n) => {
                u64::try_from(n).map_err(|_| Error::protocol("negative scan cursor"))
            }
            Reply::Bulk(text) => std::str::from_utf8(&text)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::protocol("bulk reply is not a scan cursor")),
            other => Err(unexpected("cursor", &other)),
        }
    }

    pub fn into_optional_rank(self) -> Result<Option<u64>> {
        match self {
            Reply::Nil => Ok(None),
            other => other.into_count().map(Some),
        }
    }
}

fn unexpected(wanted: &str, got: &Reply) -> Error {
    Error::protocol(format!("expected {wanted} reply, got {}", got.kind()))
}

// ── Request encoding ──────────────────────────────────────────────────────────

pub(crate) fn append_array_header(out: &mut Vec<u8>, len: usize) {
    out.push(b'*');
    out.extend_from_slice(len.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

pub(crate) fn append_bulk(out: &mut Vec<u8>, data: &[u8]) {
    out.push(b'$');
    out.extend_from_slice(data.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

/// Encode `name args...` as a RESP array of bulk strings.
pub fn encode_command(name: &str, args: &[Vec<u8>]) -> Vec<u8> {
    let payload: usize = args.iter().map(|a| a.len() + 16).sum();
    let mut out = Vec::with_capacity(payload + name.len() + 32);
    append_array_header(&mut out, args.len() + 1);
    append_bulk(&mut out, name.as_bytes());
    for arg in args {
        append_bulk(&mut out, arg);
    }
    out
}

// ── Reply parsing ─────────────────────────────────────────────────────────────

fn invalid_data(msg: &'static str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg)
}

fn unexpected_eof() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "unexpected EOF")
}

fn parse_i64(bytes: &[u8], err_msg: &'static str) -> std::io::Result<i64> {
    let s = std::str::from_utf8(bytes).map_err(|_| invalid_data(err_msg))?;
    s.parse::<i64>().map_err(|_| invalid_data(err_msg))
}

/// Length header of a bulk/aggregate: `Ok(None)` for the `-1` null marker.
fn parse_len(bytes: &[u8], limit: usize, err_msg: &'static str) -> std::io::Result<Option<usize>> {
    let n = parse_i64(bytes, err_msg)?;
    if n == -1 {
        return Ok(None);
    }
    let n = usize::try_from(n).map_err(|_| invalid_data(err_msg))?;
    if n > limit {
        return Err(invalid_data("reply exceeds configured limit"));
    }
    Ok(Some(n))
}

async fn read_resp_line<'a, R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &'a mut Vec<u8>,
    max_line_len: usize,
) -> std::io::Result<Option<&'a [u8]>> {
    buf.clear();
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(unexpected_eof());
        }
        if let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
            let take = pos + 1;
            if buf.len().saturating_add(take) > max_line_len.saturating_add(2) {
                return Err(invalid_data("line too long"));
            }
            buf.extend_from_slice(&chunk[..take]);
            reader.consume(take);
            break;
        }
        if buf.len().saturating_add(chunk.len()) > max_line_len.saturating_add(2) {
            return Err(invalid_data("line too long"));
        }
        let take = chunk.len();
        buf.extend_from_slice(chunk);
        reader.consume(take);
    }
    if buf.ends_with(b"\n") {
        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }
    }
    if buf.len() > max_line_len {
        return Err(invalid_data("line too long"));
    }
    Ok(Some(buf.as_slice()))
}

async fn read_blob<R: AsyncBufRead + Unpin>(reader: &mut R, len: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf).await?;
    if crlf != *b"\r\n" {
        return Err(invalid_data("bulk payload not terminated by CRLF"));
    }
    Ok(buf)
}

type ReplyFuture<'a> = Pin<Box<dyn Future<Output = std::io::Result<Option<Reply>>> + Send + 'a>>;

/// Read one reply. `Ok(None)` means the peer closed the stream cleanly
/// before a new reply started.
pub async fn parse_reply<R: AsyncBufRead + Unpin + Send>(
    reader: &mut R,
    limits: RespLimits,
) -> std::io::Result<Option<Reply>> {
    read_reply(reader, limits, 0).await
}

fn read_reply<'a, R: AsyncBufRead + Unpin + Send>(
    reader: &'a mut R,
    limits: RespLimits,
    depth: usize,
) -> ReplyFuture<'a> {
    Box::pin(async move {
        if depth > MAX_REPLY_DEPTH {
            return Err(invalid_data("reply nested too deeply"));
        }
        let mut line = Vec::new();
        let Some(trimmed) = read_resp_line(reader, &mut line, limits.max_line_len).await? else {
            return Ok(None);
        };
        let Some((&tag, rest)) = trimmed.split_first() else {
            return Err(invalid_data("empty reply line"));
        };

        let reply = match tag {
            b'+' => Reply::Status(String::from_utf8_lossy(rest).into_owned()),
            b'-' => Reply::Error(String::from_utf8_lossy(rest).into_owned()),
            b':' => Reply::Integer(parse_i64(rest, "bad integer")?),
            b'$' => match parse_len(rest, limits.max_bulk_len, "bad len")? {
                None => Reply::Nil,
                Some(len) => Reply::Bulk(read_blob(reader, len).await?),
            },

            // ── Aggregates: arrays, RESP3 sets and pushes ───────────────────
            b'*' | b'~' | b'>' => match parse_len(rest, limits.max_array_len, "bad count")? {
                None => Reply::Nil,
                Some(count) => Reply::Array(read_items(reader, count, limits, depth).await?),
            },

            // ── RESP3 map: N pairs, flattened ───────────────────────────────
            b'%' => match parse_len(rest, limits.max_array_len / 2, "bad count")? {
                None => Reply::Nil,
                Some(count) => Reply::Array(read_items(reader, count * 2, limits, depth).await?),
            },

            b'_' => Reply::Nil,
            b'#' => Reply::Boolean(rest == b"t"),
            b',' => {
                let s = std::str::from_utf8(rest).map_err(|_| invalid_data("bad double"))?;
                Reply::Double(s.parse().map_err(|_| invalid_data("bad double"))?)
            }
            b'(' => Reply::Bulk(rest.to_vec()),

            // ── RESP3 verbatim string: `<enc>:<data>` ───────────────────────
            b'=' => match parse_len(rest, limits.max_bulk_len, "bad len")? {
                None => Reply::Nil,
                Some(len) => {
                    let mut payload = read_blob(reader, len).await?;
                    if payload.len() >= 4 && payload[3] == b':' {
                        payload.drain(..4);
                    }
                    Reply::Bulk(payload)
                }
            },

            // ── RESP3 blob error ────────────────────────────────────────────
            b'!' => match parse_len(rest, limits.max_bulk_len, "bad len")? {
                None => Reply::Nil,
                Some(len) => {
                    let payload = read_blob(reader, len).await?;
                    Reply::Error(String::from_utf8_lossy(&payload).into_owned())
                }
            },

            _ => return Err(invalid_data("unknown reply type")),
        };
        Ok(Some(reply))
    })
}

async fn read_items<R: AsyncBufRead + Unpin + Send>(
    reader: &mut R,
    count: usize,
    limits: RespLimits,
    depth: usize,
) -> std::io::Result<Vec<Reply>> {
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        match read_reply(&mut *reader, limits, depth + 1).await? {
            Some(item) => items.push(item),
            None => return Err(unexpected_eof()),
        }
    }
    Ok(items)
}
