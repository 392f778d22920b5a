//! Command descriptors.
//!
//! Every wire command the adapter issues is a `Command`; the set operations
//! only differ in which command they pick and how they lay out arguments.

use crate::resp::encode_command;

/// Routing hint: reads may go to a replica, writes must reach the primary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    ZAdd,
    ZRem,
    ZRemRangeByRank,
    ZRemRangeByScore,
    ZCard,
    ZScore,
    ZRank,
    ZRevRank,
    ZRange,
    ZRangeByScore,
    ZRevRangeByScore,
    ZIncrBy,
    ZScan,
    Del,
    Eval,
}

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Command::ZAdd => "ZADD",
            Command::ZRem => "ZREM",
            Command::ZRemRangeByRank => "ZREMRANGEBYRANK",
            Command::ZRemRangeByScore => "ZREMRANGEBYSCORE",
            Command::ZCard => "ZCARD",
            Command::ZScore => "ZSCORE",
            Command::ZRank => "ZRANK",
            Command::ZRevRank => "ZREVRANK",
            Command::ZRange => "ZRANGE",
            Command::ZRangeByScore => "ZRANGEBYSCORE",
            Command::ZRevRangeByScore => "ZREVRANGEBYSCORE",
            Command::ZIncrBy => "ZINCRBY",
            Command::ZScan => "ZSCAN",
            Command::Del => "DEL",
            Command::Eval => "EVAL",
        }
    }

    pub fn access(self) -> Access {
        match self {
            Command::ZAdd
            | Command::ZRem
            | Command::ZRemRangeByRank
            | Command::ZRemRangeByScore
            | Command::ZIncrBy
            | Command::Del
            | Command::Eval => Access::Write,
            Command::ZCard
            | Command::ZScore
            | Command::ZRank
            | Command::ZRevRank
            | Command::ZRange
            | Command::ZRangeByScore
            | Command::ZRevRangeByScore
            | Command::ZScan => Access::Read,
        }
    }
}

/// One command with its arguments. `args[0]` is always the target key.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub command: Command,
    pub args: Vec<Vec<u8>>,
}

impl Request {
    pub fn new(command: Command, key: &str) -> Self {
        Self {
            command,
            args: vec![key.as_bytes().to_vec()],
        }
    }

    pub fn arg(mut self, arg: impl Into<Vec<u8>>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn push(&mut self, arg: impl Into<Vec<u8>>) {
        self.args.push(arg.into());
    }

    pub fn key(&self) -> &[u8] {
        self.args.first().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn to_frame(&self) -> Vec<u8> {
        encode_command(self.command.name(), &self.args)
    }

    /// Arguments as text, for logs and test assertions.
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect()
    }
}
