/// Errors surfaced by the sorted-set adapter.
///
/// Absence of an element, score or rank is not an error: those operations
/// return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value, score or script argument could not be serialized (or a stored
    /// value could not be deserialized by the codec).
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The store answered with a reply this layer cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The store answered with an error reply.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunked `remove_all` failed part way. Chunks before the failing one
    /// have already been applied on the store and are not rolled back.
    #[error(
        "batch failed after {applied_chunks} of {total_chunks} chunks were applied \
         (removed_any={removed_any}): {source}"
    )]
    PartialBatch {
        applied_chunks: usize,
        total_chunks: usize,
        removed_any: bool,
        #[source]
        source: Box<Error>,
    },

    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    #[error("request routed to unknown node {0}")]
    UnknownNode(String),
}

impl Error {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub(crate) fn encoding(msg: impl std::fmt::Display) -> Self {
        Error::Encoding(msg.to_string())
    }

    /// True for failures caused by the store's reply rather than by local data.
    pub fn is_remote_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_) | Error::Remote(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
