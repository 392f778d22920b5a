//! The seam between the collection adapter and whatever moves bytes.
//!
//! Pooling, topology, retries and timeouts all live behind `Dispatcher`; the
//! adapter only says what to run, where, and whether it writes.

use std::fmt;

use async_trait::async_trait;

use crate::command::{Access, Request};
use crate::error::Result;
use crate::resp::Reply;
use crate::script::Script;

/// Identity of a store node, as the dispatcher reports it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Whichever node owns this key.
    Key(String),
    /// A specific node; used to continue a scan where it started.
    Node(NodeId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    /// Node that produced the reply.
    pub node: NodeId,
    pub reply: Reply,
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn execute(&self, route: Route, access: Access, request: Request) -> Result<Response>;

    /// Run `script` atomically on the store with the given keys and arguments.
    async fn eval(
        &self,
        route: Route,
        access: Access,
        script: &Script,
        keys: Vec<String>,
        args: Vec<Vec<u8>>,
    ) -> Result<Response>;
}
