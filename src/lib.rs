//! Replicated inventory service.
//!
//! Several replicas each track the availability of a shared item catalog,
//! serve concurrent client sessions over a line-oriented text protocol, and
//! push mutations to their peers on a best-effort basis. Each module covers
//! one concern:
//!
//! - [`cli`] parses the command-line interface for the replica, cluster,
//!   and client modes.
//! - [`config`] holds the static replica topology and startup parameters.
//! - [`protocol`] implements the line framing shared by clients and peers.
//! - [`inventory`], [`clock`], and [`oplog`] are the per-replica store,
//!   vector clock, and append-only operation log.
//! - [`replica`] accepts connections and runs one session task per client,
//!   serializing operations through a single exclusion section.
//! - [`replication`] drains mutation notices to peers off the critical
//!   path.
//! - [`election`] runs the startup bully-style coordinator selection.
//! - [`client`] is the interactive terminal counterpart.
//!
//! Integration tests drive real TCP connections against in-process
//! replicas; one end-to-end test exercises the compiled binary.

pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod election;
pub mod inventory;
pub mod oplog;
pub mod protocol;
pub mod replica;
pub mod replication;
