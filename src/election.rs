//! Bully-style coordinator selection.
//!
//! At startup the ordinal-0 replica proposes itself: it notifies every
//! higher-ordinal peer, waits out a fixed timeout, and declares itself
//! leader unless a competing claim arrived in the meantime. The elected
//! identity is recorded but consulted by nothing else in this service.

use std::sync::Arc;

use tracing::{info, warn};

use crate::protocol::ElectionNotice;
use crate::replica::ReplicaContext;
use crate::replication;

/// Election progress for one replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElectionPhase {
    #[default]
    Idle,
    InProgress,
    LeaderKnown,
}

/// Leader bookkeeping. Mutated only by the election driver and by incoming
/// election frames; read by diagnostics and tests.
#[derive(Debug, Default)]
pub struct LeaderState {
    phase: ElectionPhase,
    claim: Option<usize>,
    leader: Option<usize>,
}

impl LeaderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an election as started. Returns false when one is already
    /// running or a leader is known.
    pub fn begin(&mut self) -> bool {
        if self.phase != ElectionPhase::Idle {
            return false;
        }
        self.phase = ElectionPhase::InProgress;
        self.claim = None;
        true
    }

    /// Records a competing claim. Claims only count while an election is in
    /// progress; a later claim replaces an earlier one.
    pub fn observe_claim(&mut self, ordinal: usize) -> bool {
        if self.phase != ElectionPhase::InProgress {
            return false;
        }
        self.claim = Some(ordinal);
        true
    }

    /// Ends the election: a recorded claimant wins, otherwise the initiating
    /// replica declares itself leader. Idempotent once a leader is known.
    pub fn conclude(&mut self, self_ordinal: usize) -> usize {
        if self.phase == ElectionPhase::InProgress {
            self.leader = Some(self.claim.take().unwrap_or(self_ordinal));
            self.phase = ElectionPhase::LeaderKnown;
        }
        self.leader.unwrap_or(self_ordinal)
    }

    pub fn leader(&self) -> Option<usize> {
        self.leader
    }

    pub fn phase(&self) -> ElectionPhase {
        self.phase
    }

    pub fn in_progress(&self) -> bool {
        self.phase == ElectionPhase::InProgress
    }
}

/// Runs the startup election for this replica: notify every higher ordinal,
/// wait out the timeout, then settle the local leader state.
pub async fn run_election(ctx: Arc<ReplicaContext>) {
    {
        let mut leader = ctx.leader_state().lock().await;
        if !leader.begin() {
            return;
        }
    }

    let ordinal = ctx.ordinal();
    info!(ordinal, "starting leader election");

    let notice = ElectionNotice { initiator: ordinal };
    for (peer, addr) in ctx.topology().higher_than(ordinal) {
        if let Err(error) = replication::send_line(addr, &notice.encode()).await {
            warn!(peer, %addr, %error, "election notice not delivered");
        }
    }

    tokio::time::sleep(ctx.election_timeout()).await;

    let leader = ctx.leader_state().lock().await.conclude(ordinal);
    if leader == ordinal {
        info!(ordinal, "no competing claim arrived, declaring self leader");
    } else {
        info!(ordinal, leader, "election concluded with a competing claim");
    }
}
