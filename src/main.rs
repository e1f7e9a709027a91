use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use inventory_mesh::{
    cli::{Cli, ClusterArgs, Command},
    client,
    config::ReplicaConfig,
    replica::Replica,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Replica(args) => {
            let config = args.config()?;
            let addr = config.topology.addr_of(config.ordinal)?;
            let listener = TcpListener::bind(addr).await?;
            let replica = Replica::new(listener, config)?;
            info!(
                "replica {} listening on {}",
                replica.ordinal(),
                replica.local_addr()?
            );
            if let Err(error) = replica.run_until_ctrl_c().await {
                warn!("replica exited with error: {error:?}");
                return Err(error);
            }
        }
        Command::Cluster(args) => run_cluster(args).await?,
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}

/// Runs every replica of the topology in this process, each with its own
/// listener and context.
async fn run_cluster(args: ClusterArgs) -> Result<()> {
    let topology = args.topology()?;
    let election_timeout = args.election_timeout();

    let mut replicas = Vec::new();
    for ordinal in 0..topology.len() {
        let config = ReplicaConfig::new(topology.clone(), ordinal)?
            .with_election_timeout(election_timeout);
        let listener = TcpListener::bind(topology.addr_of(ordinal)?).await?;
        let replica = Replica::new(listener, config)?;
        info!(
            "replica {} listening on {}",
            replica.ordinal(),
            replica.local_addr()?
        );
        replicas.push(replica);
    }

    let mut tasks = Vec::new();
    for replica in replicas {
        tasks.push(tokio::spawn(replica.run_until_ctrl_c()));
    }
    for task in tasks {
        task.await??;
    }

    Ok(())
}
