//! Shared helpers for the socket-level integration tests.

use std::time::Duration;

use arena_client::{GameClient, SyncCore};
use arena_server::server::bind_ephemeral;
use arena_shared::{config::ArenaConfig, physics::ArcadeMotion, render::HeadlessDisplay};
use tokio::time::Instant;
use tracing::info;

/// How long a test waits for an expected event before failing.
pub const WAIT: Duration = Duration::from_secs(3);

pub type HeadlessCore = SyncCore<ArcadeMotion, HeadlessDisplay>;

/// Installs a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Starts a seeded server on an ephemeral port, running in the background.
pub async fn spawn_server(seed: u64) -> anyhow::Result<ArenaConfig> {
    let (server, cfg) = bind_ephemeral(seed).await?;
    info!(addr = %cfg.server_addr, seed, "Test server listening");
    tokio::spawn(server.run());
    Ok(cfg)
}

/// Processes inbound events until `pred` holds for the client's core.
pub async fn wait_until<F>(client: &mut GameClient, mut pred: F) -> anyhow::Result<()>
where
    F: FnMut(&HeadlessCore) -> bool,
{
    let deadline = Instant::now() + WAIT;
    while !pred(client.core()) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, client.recv()).await {
            Ok(result) => {
                result?;
            }
            Err(_) => anyhow::bail!("condition not reached within {WAIT:?}"),
        }
    }
    Ok(())
}
