//! Best-effort propagation of mutations to peer replicas.
//!
//! Sessions hand mutation notices to a bounded queue; a dedicated worker
//! task drains it, so a slow or unreachable peer never sits on a session's
//! critical path. Each notice opens a fresh connection per peer, writes one
//! tagged line, and closes it. Nothing is acknowledged, retried, or ordered
//! across peers.

use std::io;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::MutationNotice;

/// Notices queued beyond this are dropped with a warning.
pub const QUEUE_DEPTH: usize = 64;

/// Drains the notice queue until every sender is gone, pushing each notice
/// to every peer in turn.
pub async fn run_propagator(mut notices: mpsc::Receiver<MutationNotice>, peers: Vec<SocketAddr>) {
    while let Some(notice) = notices.recv().await {
        let line = notice.encode();
        for &addr in &peers {
            match send_line(addr, &line).await {
                Ok(()) => debug!(%addr, notice = %line, "mutation pushed to peer"),
                Err(error) => warn!(%addr, %error, "peer unreachable during replication"),
            }
        }
    }
}

/// Opens a fresh connection, writes one line, and closes it without reading
/// a response.
pub async fn send_line(addr: SocketAddr, line: &str) -> io::Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.shutdown().await?;
    Ok(())
}
