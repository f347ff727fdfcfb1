//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p arena_server -- [--addr 127.0.0.1:3000] [--seed 42]
//!
//! The server accepts client connections, assigns teams and spawn points,
//! relays poses, and keeps score as stars are collected.

use std::env;

use anyhow::Context;
use arena_server::ArenaServer;
use arena_shared::config::ArenaConfig;
use tracing::info;

fn parse_args() -> (ArenaConfig, Option<u64>) {
    let mut cfg = ArenaConfig::default();
    let mut seed = None;
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                seed = args[i + 1].parse().ok();
                i += 2;
            }
            _ => i += 1,
        }
    }
    (cfg, seed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (cfg, seed) = parse_args();
    info!(addr = %cfg.server_addr, ?seed, "Starting server");

    let mut server = ArenaServer::bind(cfg).await.context("create server")?;
    if let Some(seed) = seed {
        server = server.with_seed(seed);
    }
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    server.run().await
}
