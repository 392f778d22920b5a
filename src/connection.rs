use async_trait::async_trait;
use tokio::io::{
    AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::command::{Access, Command, Request};
use crate::config::Config;
use crate::dispatch::{Dispatcher, NodeId, Response, Route};
use crate::error::{Error, Result};
use crate::resp::{RespLimits, encode_command, parse_reply};
use crate::script::Script;

struct Io<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,
    /// Set while a request is in flight. A round trip abandoned half way
    /// leaves its reply unread, so the stream can no longer be trusted.
    desynced: bool,
}

/// A `Dispatcher` over a single RESP stream.
///
/// Requests are serialised on the stream, so replies always match their
/// requests and commands on one connection keep their relative order. Every
/// route resolves to the one node behind the stream.
pub struct RespConnection<S> {
    node: NodeId,
    limits: RespLimits,
    io: Mutex<Io<S>>,
}

impl RespConnection<TcpStream> {
    pub async fn connect(config: &Config) -> Result<Self> {
        let addr = config.server_addr();
        let stream = TcpStream::connect(&addr).await?;
        // Disable Nagle: every request is a complete frame waiting on its reply.
        let _ = stream.set_nodelay(true);
        info!(addr = %addr, "connected");
        Ok(Self::from_stream(stream, NodeId::new(addr), RespLimits::from(config)))
    }
}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> RespConnection<S> {
    pub fn from_stream(stream: S, node: NodeId, limits: RespLimits) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            node,
            limits,
            io: Mutex::new(Io {
                reader: BufReader::with_capacity(64 * 1024, read_half),
                writer: BufWriter::with_capacity(64 * 1024, write_half),
                desynced: false,
            }),
        }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    fn check_route(&self, route: &Route) -> Result<()> {
        match route {
            Route::Node(node) if *node != self.node => Err(Error::UnknownNode(node.to_string())),
            _ => Ok(()),
        }
    }

    async fn round_trip(&self, command: Command, frame: &[u8]) -> Result<Response> {
        let mut guard = self.io.lock().await;
        let io = &mut *guard;
        if io.desynced {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "connection abandoned mid-request",
            )));
        }
        io.desynced = true;
        io.writer.write_all(frame).await?;
        io.writer.flush().await?;
        let reply = match parse_reply(&mut io.reader, self.limits).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                warn!(node = %self.node, command = command.name(), "connection closed by peer");
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )));
            }
            Err(e) => {
                debug!(node = %self.node, error = %e, "reply parse error");
                return Err(Error::Io(e));
            }
        };
        io.desynced = false;
        Ok(Response {
            node: self.node.clone(),
            reply,
        })
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Send + Unpin> Dispatcher for RespConnection<S> {
    async fn execute(&self, route: Route, _access: Access, request: Request) -> Result<Response> {
        self.check_route(&route)?;
        debug!(node = %self.node, command = request.command.name(), args = request.args.len().saturating_sub(1), "request");
        self.round_trip(request.command, &request.to_frame()).await
    }

    async fn eval(
        &self,
        route: Route,
        _access: Access,
        script: &Script,
        keys: Vec<String>,
        args: Vec<Vec<u8>>,
    ) -> Result<Response> {
        self.check_route(&route)?;
        debug!(node = %self.node, script = script.name, keys = keys.len(), args = args.len(), "eval");
        let mut parts = Vec::with_capacity(2 + keys.len() + args.len());
        parts.push(script.body.as_bytes().to_vec());
        parts.push(keys.len().to_string().into_bytes());
        parts.extend(keys.into_iter().map(String::into_bytes));
        parts.extend(args);
        self.round_trip(Command::Eval, &encode_command(Command::Eval.name(), &parts))
            .await
    }
}
