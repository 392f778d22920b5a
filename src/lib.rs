//! Sorted sets on a kvns (or any RESP-speaking) store.
//!
//! [`ScoredSortedSet`] turns collection operations into `Z*` commands. Reads
//! and single-step writes are plain commands; operations that must read and
//! then mutate without interference (`poll_first`, `retain_all`, ...) run as
//! server-side scripts. Transport is behind the [`Dispatcher`] trait;
//! [`RespConnection`] is a single-stream implementation of it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use kvns_zset::{Codec, Config, RespConnection, ScoredSortedSet, SetOptions, StringCodec};
//!
//! # async fn demo() -> kvns_zset::Result<()> {
//! let config = Config::from_env();
//! let conn = Arc::new(RespConnection::connect(&config).await?);
//! let codec: Arc<dyn Codec<String>> = Arc::new(StringCodec);
//! let board = ScoredSortedSet::new("leaderboard", codec, conn)
//!     .with_options(SetOptions::from(&config));
//! board.add(10.0, &"alice".to_string()).await?;
//! assert!(board.last().await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod codec;
pub mod command;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod iter;
pub mod range;
pub mod resp;
pub mod score;
pub mod script;
pub mod set;

pub use blocking::{BlockingScanIter, BlockingScoredSortedSet};
pub use codec::{BincodeCodec, BytesCodec, Codec, StringCodec};
pub use command::{Access, Command, Request};
pub use config::Config;
pub use connection::RespConnection;
pub use dispatch::{Dispatcher, NodeId, Response, Route};
pub use error::{Error, Result};
pub use iter::ScanIter;
pub use range::{Limit, Order, RankRange, ScoreBound, ScoreRange, ScoredEntry};
pub use resp::Reply;
pub use set::{ScoredSortedSet, SetOptions};
