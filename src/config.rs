use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};

/// How long an initiating replica waits for a competing claim before
/// declaring itself leader.
pub const DEFAULT_ELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Statically configured replica set. A replica's ordinal is its position in
/// the list; membership never changes at runtime.
#[derive(Debug, Clone)]
pub struct Topology {
    replicas: Vec<SocketAddr>,
}

impl Topology {
    pub fn new(replicas: Vec<SocketAddr>) -> Result<Self> {
        ensure!(
            !replicas.is_empty(),
            "topology requires at least one replica"
        );
        Ok(Self { replicas })
    }

    /// Three local replicas, the first acting as the primary client entry
    /// point.
    pub fn default_local() -> Self {
        let replicas = (12345..=12347)
            .map(|port| SocketAddr::from(([127, 0, 0, 1], port)))
            .collect();
        Self { replicas }
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn addr_of(&self, ordinal: usize) -> Result<SocketAddr> {
        self.replicas.get(ordinal).copied().with_context(|| {
            format!(
                "ordinal {ordinal} outside topology of {} replicas",
                self.replicas.len()
            )
        })
    }

    /// Every replica address except the given ordinal's own.
    pub fn peers_of(&self, ordinal: usize) -> Vec<SocketAddr> {
        self.replicas
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != ordinal)
            .map(|(_, addr)| *addr)
            .collect()
    }

    /// Replicas with a higher ordinal than the given one, in ordinal order.
    pub fn higher_than(&self, ordinal: usize) -> Vec<(usize, SocketAddr)> {
        self.replicas
            .iter()
            .enumerate()
            .skip(ordinal + 1)
            .map(|(index, addr)| (index, *addr))
            .collect()
    }
}

/// Startup parameters for one replica. Everything here is static; there is
/// no runtime reconfiguration.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    pub topology: Topology,
    pub ordinal: usize,
    pub election_timeout: Duration,
    pub catalog: Vec<(String, u32)>,
}

impl ReplicaConfig {
    pub fn new(topology: Topology, ordinal: usize) -> Result<Self> {
        ensure!(
            ordinal < topology.len(),
            "ordinal {ordinal} outside topology of {} replicas",
            topology.len()
        );
        Ok(Self {
            topology,
            ordinal,
            election_timeout: DEFAULT_ELECTION_TIMEOUT,
            catalog: default_catalog(),
        })
    }

    pub fn with_election_timeout(mut self, timeout: Duration) -> Self {
        self.election_timeout = timeout;
        self
    }

    pub fn with_catalog(mut self, catalog: Vec<(String, u32)>) -> Self {
        self.catalog = catalog;
        self
    }
}

/// Catalog every replica starts from.
pub fn default_catalog() -> Vec<(String, u32)> {
    vec![
        ("book1".to_string(), 3),
        ("book2".to_string(), 5),
        ("book3".to_string(), 2),
    ]
}
