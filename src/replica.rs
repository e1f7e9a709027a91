//! One inventory replica: the listener, its client sessions, and the shared
//! state they operate on.
//!
//! Every accepted connection runs in its own task. Sessions execute
//! inventory operations through a single exclusion section covering the
//! store, the vector clock, and the operation log, so a clock advance and
//! the mutation it stamps are atomic. Replication happens outside that
//! section through the bounded queue in [`crate::replication`].

use std::{
    collections::HashMap,
    future::Future,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, bail};
use tokio::{
    io::BufReader,
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
    sync::{Mutex, mpsc},
};
use tracing::{debug, info, warn};

use crate::{
    clock::VectorClock,
    config::{ReplicaConfig, Topology},
    election::{self, LeaderState},
    inventory::{BorrowOutcome, CheckOutcome, Inventory, ReturnOutcome},
    oplog::{OpKind, OperationLog, OperationRecord},
    protocol::{self, ClientCommand, ElectionNotice, Frame, MutationNotice},
    replication,
};

pub const USERNAME_PROMPT: &str = "Please enter your username:";

/// One replica: a listener plus the context its sessions and workers share.
pub struct Replica {
    listener: TcpListener,
    ctx: Arc<ReplicaContext>,
    notices: mpsc::Receiver<MutationNotice>,
}

impl Replica {
    pub fn new(listener: TcpListener, config: ReplicaConfig) -> Result<Self> {
        let (notice_tx, notice_rx) = mpsc::channel(replication::QUEUE_DEPTH);
        let ctx = ReplicaContext::new(config, notice_tx)?;
        Ok(Self {
            listener,
            ctx: Arc::new(ctx),
            notices: notice_rx,
        })
    }

    pub fn context(&self) -> Arc<ReplicaContext> {
        Arc::clone(&self.ctx)
    }

    pub fn ordinal(&self) -> usize {
        self.ctx.ordinal
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the shutdown future resolves, then stops
    /// accepting and dumps the operation log. Sessions already running are
    /// left to drain on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Replica {
            listener,
            ctx,
            notices,
        } = self;
        tokio::pin!(shutdown);

        let peers = ctx.topology.peers_of(ctx.ordinal);
        tokio::spawn(replication::run_propagator(notices, peers));

        // The lowest ordinal proposes itself as coordinator at startup.
        if ctx.ordinal == 0 {
            tokio::spawn(election::run_election(Arc::clone(&ctx)));
        }

        loop {
            select! {
                _ = &mut shutdown => {
                    info!(ordinal = ctx.ordinal, "replica shutting down");
                    ctx.dump_log().await;
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => spawn_connection_handler(stream, peer, &ctx),
                        Err(error) => warn!(%error, "failed to accept connection"),
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(?error, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn spawn_connection_handler(stream: TcpStream, peer: SocketAddr, ctx: &Arc<ReplicaContext>) {
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        if let Err(error) = handle_connection(stream, peer, ctx).await {
            warn!(%peer, %error, "connection closed with error");
        }
    });
}

/// Store, clock, and log advance together under one lock.
struct ReplicaState {
    inventory: Inventory,
    clock: VectorClock,
    log: OperationLog,
}

/// Everything a replica's sessions and workers share. Constructed once at
/// startup and passed around explicitly; there is no process-global state,
/// so several replicas can coexist in one process.
pub struct ReplicaContext {
    ordinal: usize,
    topology: Topology,
    election_timeout: Duration,
    state: Mutex<ReplicaState>,
    sessions: Mutex<HashMap<SocketAddr, String>>,
    leader: Mutex<LeaderState>,
    peer_notices: AtomicU64,
    notice_tx: mpsc::Sender<MutationNotice>,
}

impl ReplicaContext {
    fn new(config: ReplicaConfig, notice_tx: mpsc::Sender<MutationNotice>) -> Result<Self> {
        let ReplicaConfig {
            topology,
            ordinal,
            election_timeout,
            catalog,
        } = config;
        let clock = VectorClock::new(topology.len(), ordinal)?;
        Ok(Self {
            ordinal,
            topology,
            election_timeout,
            state: Mutex::new(ReplicaState {
                inventory: Inventory::from_catalog(catalog),
                clock,
                log: OperationLog::new(),
            }),
            sessions: Mutex::new(HashMap::new()),
            leader: Mutex::new(LeaderState::new()),
            peer_notices: AtomicU64::new(0),
            notice_tx,
        })
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub(crate) fn topology(&self) -> &Topology {
        &self.topology
    }

    pub(crate) fn election_timeout(&self) -> Duration {
        self.election_timeout
    }

    pub(crate) fn leader_state(&self) -> &Mutex<LeaderState> {
        &self.leader
    }

    /// Current leader ordinal, once an election has settled one.
    pub async fn leader(&self) -> Option<usize> {
        self.leader.lock().await.leader()
    }

    /// Available count for an item, if the item exists.
    pub async fn item_count(&self, item: &str) -> Option<u32> {
        self.state.lock().await.inventory.count(item)
    }

    pub async fn clock_snapshot(&self) -> Vec<u64> {
        self.state.lock().await.clock.snapshot()
    }

    pub async fn log_len(&self) -> usize {
        self.state.lock().await.log.len()
    }

    /// Number of registered client sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Mutation notices received from peers so far.
    pub fn peer_notice_count(&self) -> u64 {
        self.peer_notices.load(Ordering::Relaxed)
    }

    async fn dump_log(&self) {
        self.state.lock().await.log.dump();
    }

    /// Hands a mutation off to the replication worker. Never blocks a
    /// session: when the queue is full the notice is dropped, keeping
    /// replication best-effort.
    fn queue_replication(&self, notice: MutationNotice) {
        use mpsc::error::TrySendError;
        match self.notice_tx.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(notice)) => {
                warn!(item = %notice.item, "replication queue full, dropping notice");
            }
            Err(TrySendError::Closed(_)) => {
                warn!("replication worker gone, dropping notice");
            }
        }
    }

    fn note_peer_mutation(&self, notice: &MutationNotice) {
        self.peer_notices.fetch_add(1, Ordering::Relaxed);
        info!(
            ordinal = self.ordinal,
            kind = %notice.kind,
            item = %notice.item,
            "mutation notice from peer"
        );
    }

    async fn note_election(&self, notice: ElectionNotice) {
        let recorded = self
            .leader
            .lock()
            .await
            .observe_claim(notice.initiator);
        if recorded {
            info!(
                ordinal = self.ordinal,
                initiator = notice.initiator,
                "competing election claim recorded"
            );
        } else {
            info!(
                ordinal = self.ordinal,
                initiator = notice.initiator,
                "election notice received"
            );
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ReplicaContext>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // The prompt goes out before the connection class is known; replica
    // peers never read it.
    if let Err(error) = protocol::write_line(&mut writer, USERNAME_PROMPT).await {
        debug!(%peer, %error, "connection closed before the prompt");
        return Ok(());
    }

    let Some(first) = protocol::read_line(&mut reader).await? else {
        return Ok(());
    };

    match protocol::classify(&first)? {
        Frame::Mutation(notice) => {
            ctx.note_peer_mutation(&notice);
            Ok(())
        }
        Frame::Election(notice) => {
            ctx.note_election(notice).await;
            Ok(())
        }
        Frame::Hello(username) => run_session(&ctx, &mut reader, &mut writer, peer, username).await,
    }
}

async fn run_session(
    ctx: &ReplicaContext,
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    peer: SocketAddr,
    username: String,
) -> Result<()> {
    if username.is_empty() {
        protocol::write_line(writer, "A username is required.").await?;
        bail!("client sent a blank username");
    }

    ctx.sessions.lock().await.insert(peer, username.clone());
    info!(%peer, %username, "client connected");
    protocol::write_line(writer, &format!("Welcome, {username}!")).await?;

    let result = session_loop(ctx, reader, writer, &username).await;

    ctx.sessions.lock().await.remove(&peer);
    info!(%peer, %username, "client disconnected");
    result
}

async fn session_loop(
    ctx: &ReplicaContext,
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    username: &str,
) -> Result<()> {
    loop {
        let Some(line) = protocol::read_line(reader).await? else {
            break;
        };

        let command = match ClientCommand::parse(&line) {
            Ok(command) => command,
            Err(_) => {
                protocol::write_line(
                    writer,
                    &format!("{username}, invalid option. Please try again."),
                )
                .await?;
                continue;
            }
        };

        match command {
            ClientCommand::Exit => {
                debug!(%username, "session closed by EXIT");
                break;
            }
            ClientCommand::Operation { kind, item } => {
                let (response, notice) = execute_operation(ctx, username, kind, &item).await;
                if let Some(notice) = notice {
                    ctx.queue_replication(notice);
                }
                protocol::write_line(writer, &response).await?;
            }
        }
    }
    Ok(())
}

/// Runs one inventory operation inside the exclusion section: the clock
/// advances exactly once per attempt, the outcome is evaluated, and a
/// record is appended, all before the lock is released. Successful
/// mutations come back with a notice for the replication queue.
async fn execute_operation(
    ctx: &ReplicaContext,
    username: &str,
    kind: OpKind,
    item: &str,
) -> (String, Option<MutationNotice>) {
    let mut state = ctx.state.lock().await;
    let stamp = state.clock.advance();

    let (response, mutated) = match kind {
        OpKind::Check => match state.inventory.check(item) {
            CheckOutcome::Available(count) => (
                format!("{username}, {item} is available, {count} left."),
                false,
            ),
            CheckOutcome::Unavailable => (
                format!("{username}, {item} is not available right now."),
                false,
            ),
        },
        OpKind::Borrow => match state.inventory.borrow_item(item) {
            BorrowOutcome::Borrowed { .. } => {
                (format!("{username}, you have borrowed {item}."), true)
            }
            BorrowOutcome::Unavailable => (
                format!("{username}, {item} is currently unavailable."),
                false,
            ),
        },
        OpKind::Return => match state.inventory.return_item(item) {
            ReturnOutcome::Returned { .. } => (
                format!("{username}, thank you for returning {item}."),
                true,
            ),
            ReturnOutcome::UnknownItem => {
                (format!("{username}, invalid item {item}."), false)
            }
        },
    };

    state.log.append(OperationRecord {
        username: username.to_string(),
        kind,
        item: item.to_string(),
        clock: stamp.clone(),
    });
    debug!(
        ordinal = ctx.ordinal,
        %kind,
        item,
        clock = ?stamp,
        "operation recorded"
    );

    let notice = mutated.then(|| MutationNotice {
        kind,
        item: item.to_string(),
    });
    (response, notice)
}
