//! Line framing and message parsing for the shared listener.
//!
//! Client commands, peer replication notices, and election notices all
//! arrive over the same TCP port. The first line of a connection carries the
//! frame kind: lines opening with a reserved tag (`REPLICATE`, `ELECTION`)
//! are replica-to-replica notices, anything else is a client's answer to the
//! username prompt.

use std::io;

use anyhow::{Result, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::oplog::OpKind;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

const REPLICATE_TAG: &str = "REPLICATE";
const ELECTION_TAG: &str = "ELECTION";

/// Reads one non-blank line, or `None` once the connection closes.
pub async fn read_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(LINE_ENDINGS);
        if trimmed.is_empty() {
            continue;
        }

        return Ok(Some(trimmed.to_string()));
    }
}

/// Writes one line and flushes so the peer sees it immediately.
pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// A command issued by a connected client, one per line. Keywords are
/// exact-match uppercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Operation { kind: OpKind, item: String },
    Exit,
}

impl ClientCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["EXIT"] => Ok(ClientCommand::Exit),
            ["CHECK", item] => Ok(ClientCommand::Operation {
                kind: OpKind::Check,
                item: item.to_string(),
            }),
            ["BORROW", item] => Ok(ClientCommand::Operation {
                kind: OpKind::Borrow,
                item: item.to_string(),
            }),
            ["RETURN", item] => Ok(ClientCommand::Operation {
                kind: OpKind::Return,
                item: item.to_string(),
            }),
            _ => bail!("unrecognized command: {line}"),
        }
    }
}

/// Mutation notice pushed to every peer after a successful BORROW or RETURN.
/// Carries no vector clock and no sender identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationNotice {
    pub kind: OpKind,
    pub item: String,
}

impl MutationNotice {
    pub fn encode(&self) -> String {
        format!("{REPLICATE_TAG} {} {}", self.kind, self.item)
    }
}

/// Election notice sent by a replica proposing itself as coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectionNotice {
    pub initiator: usize,
}

impl ElectionNotice {
    pub fn encode(&self) -> String {
        format!("{ELECTION_TAG} {}", self.initiator)
    }
}

/// What the first line of an inbound connection turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A client answering the username prompt.
    Hello(String),
    /// A peer pushing a replicated mutation.
    Mutation(MutationNotice),
    /// A peer announcing an election.
    Election(ElectionNotice),
}

/// Classifies the first line of a connection. Malformed peer frames are
/// errors; they are never reinterpreted as usernames.
pub fn classify(line: &str) -> Result<Frame> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [REPLICATE_TAG, "BORROW", item] => Ok(Frame::Mutation(MutationNotice {
            kind: OpKind::Borrow,
            item: item.to_string(),
        })),
        [REPLICATE_TAG, "RETURN", item] => Ok(Frame::Mutation(MutationNotice {
            kind: OpKind::Return,
            item: item.to_string(),
        })),
        [REPLICATE_TAG, ..] => bail!("malformed mutation notice: {line}"),
        [ELECTION_TAG, initiator] => match initiator.parse() {
            Ok(initiator) => Ok(Frame::Election(ElectionNotice { initiator })),
            Err(_) => bail!("malformed election notice: {line}"),
        },
        [ELECTION_TAG, ..] => bail!("malformed election notice: {line}"),
        _ => Ok(Frame::Hello(line.trim().to_string())),
    }
}
