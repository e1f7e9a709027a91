use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::config::{ReplicaConfig, Topology};

const DEFAULT_REPLICAS: &str = "127.0.0.1:12345,127.0.0.1:12346,127.0.0.1:12347";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one replica of the configured topology.
    Replica(ReplicaArgs),
    /// Run every replica of the topology in this process.
    Cluster(ClusterArgs),
    /// Connect to a replica as an interactive client.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReplicaArgs {
    /// Position of this replica in the topology.
    #[arg(long, default_value_t = 0)]
    pub ordinal: usize,

    /// Comma-separated replica addresses; ordinals follow list order.
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_REPLICAS)]
    pub replicas: Vec<SocketAddr>,

    /// How long the initiating replica waits for a competing claim.
    #[arg(long, default_value_t = 5000)]
    pub election_timeout_ms: u64,
}

impl ReplicaArgs {
    pub fn config(&self) -> Result<ReplicaConfig> {
        let topology = Topology::new(self.replicas.clone())?;
        Ok(ReplicaConfig::new(topology, self.ordinal)?
            .with_election_timeout(Duration::from_millis(self.election_timeout_ms)))
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Comma-separated replica addresses; ordinals follow list order.
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_REPLICAS)]
    pub replicas: Vec<SocketAddr>,

    /// How long the initiating replica waits for a competing claim.
    #[arg(long, default_value_t = 5000)]
    pub election_timeout_ms: u64,
}

impl ClusterArgs {
    pub fn topology(&self) -> Result<Topology> {
        Topology::new(self.replicas.clone())
    }

    pub fn election_timeout(&self) -> Duration {
        Duration::from_millis(self.election_timeout_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Username sent in answer to the server's prompt.
    #[arg(long)]
    pub username: String,

    /// Address of the replica to connect to.
    #[arg(long, default_value = "127.0.0.1:12345")]
    pub server: SocketAddr,
}
