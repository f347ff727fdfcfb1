//! Server implementation.
//!
//! A reference authority for the arena protocol. It supports:
//! - Handshake and session id assignment
//! - Team and spawn assignment for new players
//! - Relaying local poses to every other player
//! - Star placement, collection and team scoring
//!
//! All match state lives in one [`Authority`] owned by a single task.
//! Connection tasks only move frames between sockets and that task.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use anyhow::Context;
use arena_shared::{
    config::ArenaConfig,
    net::{
        events, Envelope, FrameConn, FrameListener, Hello, PlayerId, PlayerMoved, PlayerMovement,
        PlayerState, Roster, ScoreState, StarLocation, Team, Welcome, PROTOCOL_VERSION,
    },
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Points a team earns per star.
pub const STAR_POINTS: u32 = 10;

/// Spawn and star positions keep this far from the world edge.
pub const EDGE_INSET: f64 = 50.0;

/// Messages from connection tasks to the authority task.
#[derive(Debug)]
pub enum Command {
    Join {
        outbound: mpsc::UnboundedSender<Envelope>,
        reply: oneshot::Sender<PlayerId>,
    },
    Event {
        player_id: PlayerId,
        env: Envelope,
    },
    Leave {
        player_id: PlayerId,
    },
}

struct Player {
    state: PlayerState,
    outbound: mpsc::UnboundedSender<Envelope>,
}

/// Match state.
pub struct Authority {
    players: HashMap<PlayerId, Player>,
    score: ScoreState,
    star: StarLocation,
    rng: StdRng,
    width: f64,
    height: f64,
    next_id: u64,
}

impl Authority {
    pub fn new(cfg: &ArenaConfig, mut rng: StdRng) -> Self {
        let star = random_point(&mut rng, cfg.world_width, cfg.world_height);
        Self {
            players: HashMap::new(),
            score: ScoreState::default(),
            star: StarLocation {
                x: star.0,
                y: star.1,
            },
            rng,
            width: cfg.world_width,
            height: cfg.world_height,
            next_id: 1,
        }
    }

    pub fn score(&self) -> ScoreState {
        self.score
    }

    pub fn star(&self) -> StarLocation {
        self.star
    }

    pub fn player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id).map(|p| &p.state)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Applies one command.
    pub fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Join { outbound, reply } => {
                let id = self.join(outbound);
                if reply.send(id.clone()).is_err() {
                    // Connection task went away mid-join.
                    self.leave(&id);
                }
            }
            Command::Event { player_id, env } => self.on_event(&player_id, env),
            Command::Leave { player_id } => self.leave(&player_id),
        }
    }

    fn join(&mut self, outbound: mpsc::UnboundedSender<Envelope>) -> PlayerId {
        let id = PlayerId::new(format!("player-{}", self.next_id));
        self.next_id += 1;

        let (x, y) = random_point(&mut self.rng, self.width, self.height);
        let team = if self.rng.gen_bool(0.5) {
            Team::Red
        } else {
            Team::Blue
        };
        let state = PlayerState {
            player_id: id.clone(),
            team,
            x,
            y,
            rotation: 0.0,
        };
        self.players.insert(
            id.clone(),
            Player {
                state: state.clone(),
                outbound,
            },
        );
        info!(player_id = %id, ?team, x, y, "Player joined");

        let roster: Roster = self
            .players
            .iter()
            .map(|(id, p)| (id.clone(), p.state.clone()))
            .collect();
        self.send_to(&id, events::WELCOME, &Welcome {
            session_id: id.clone(),
        });
        self.send_to(&id, events::CURRENT_PLAYERS, &roster);
        self.send_to(&id, events::STAR_LOCATION, &self.star);
        self.send_to(&id, events::SCORE_UPDATE, &self.score);
        self.broadcast_except(&id, events::NEW_PLAYER, &state);
        id
    }

    fn leave(&mut self, id: &PlayerId) {
        if self.players.remove(id).is_some() {
            info!(player_id = %id, "Player left");
            self.broadcast(events::DISCONNECTED, id);
        }
    }

    fn on_event(&mut self, id: &PlayerId, env: Envelope) {
        match env.event.as_str() {
            events::PLAYER_MOVEMENT => {
                let movement: PlayerMovement = match env.decode() {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(player_id = %id, error = %e, "Malformed playerMovement");
                        return;
                    }
                };
                let Some(player) = self.players.get_mut(id) else {
                    return;
                };
                player.state.x = movement.x;
                player.state.y = movement.y;
                player.state.rotation = movement.rotation;
                let moved = PlayerMoved {
                    player_id: id.clone(),
                    x: movement.x,
                    y: movement.y,
                    rotation: movement.rotation,
                };
                self.broadcast_except(id, events::PLAYER_MOVED, &moved);
            }
            events::STAR_COLLECTED => {
                let Some(team) = self.players.get(id).map(|p| p.state.team) else {
                    return;
                };
                match team {
                    Team::Red => self.score.red += STAR_POINTS,
                    Team::Blue => self.score.blue += STAR_POINTS,
                }
                let (x, y) = random_point(&mut self.rng, self.width, self.height);
                self.star = StarLocation { x, y };
                info!(player_id = %id, ?team, blue = self.score.blue, red = self.score.red, "Star collected");
                self.broadcast(events::STAR_LOCATION, &self.star);
                self.broadcast(events::SCORE_UPDATE, &self.score);
            }
            other => debug!(player_id = %id, event = other, "Unhandled client event"),
        }
    }

    fn send_to<T: Serialize>(&self, id: &PlayerId, event: &str, payload: &T) {
        let Some(player) = self.players.get(id) else {
            return;
        };
        match Envelope::new(event, payload) {
            Ok(env) => {
                let _ = player.outbound.send(env);
            }
            Err(e) => warn!(event, error = %e, "Encode failed"),
        }
    }

    fn broadcast<T: Serialize>(&self, event: &str, payload: &T) {
        self.fan_out(None, event, payload);
    }

    fn broadcast_except<T: Serialize>(&self, skip: &PlayerId, event: &str, payload: &T) {
        self.fan_out(Some(skip), event, payload);
    }

    fn fan_out<T: Serialize>(&self, skip: Option<&PlayerId>, event: &str, payload: &T) {
        let env = match Envelope::new(event, payload) {
            Ok(env) => env,
            Err(e) => {
                warn!(event, error = %e, "Encode failed");
                return;
            }
        };
        for (id, p) in &self.players {
            if Some(id) != skip {
                let _ = p.outbound.send(env.clone());
            }
        }
    }
}

fn random_point(rng: &mut StdRng, width: f64, height: f64) -> (f64, f64) {
    let span_x = (width - 2.0 * EDGE_INSET).max(1.0) as u32;
    let span_y = (height - 2.0 * EDGE_INSET).max(1.0) as u32;
    (
        f64::from(rng.gen_range(0..span_x)) + EDGE_INSET,
        f64::from(rng.gen_range(0..span_y)) + EDGE_INSET,
    )
}

/// Game server.
pub struct ArenaServer {
    pub cfg: ArenaConfig,
    listener: FrameListener,
    rng: StdRng,
}

impl ArenaServer {
    /// Binds the listener at `cfg.server_addr`.
    pub async fn bind(cfg: ArenaConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let listener = FrameListener::bind(addr).await?;
        Ok(Self {
            cfg,
            listener,
            rng: StdRng::from_entropy(),
        })
    }

    /// Uses a fixed seed for spawn, team and star placement.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
        let mut authority = Authority::new(&self.cfg, self.rng);
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                authority.apply(cmd);
            }
        });

        loop {
            let (conn, peer) = self.listener.accept().await?;
            let cmd_tx = cmd_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(conn, cmd_tx).await {
                    warn!(%peer, error = %format!("{e:#}"), "Connection ended with error");
                }
            });
        }
    }
}

async fn serve_connection(
    conn: FrameConn,
    authority: mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    let (mut reader, mut writer) = conn.into_split();

    let first = reader.recv().await?.context("closed before hello")?;
    anyhow::ensure!(
        first.event == events::HELLO,
        "expected hello, got `{}`",
        first.event
    );
    let hello: Hello = first.decode().context("decode hello")?;
    anyhow::ensure!(
        hello.protocol == PROTOCOL_VERSION,
        "protocol mismatch: client {}, server {}",
        hello.protocol,
        PROTOCOL_VERSION
    );

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Envelope>();
    let (reply_tx, reply_rx) = oneshot::channel();
    authority
        .send(Command::Join {
            outbound: out_tx,
            reply: reply_tx,
        })
        .context("authority stopped")?;
    let player_id = reply_rx.await.context("join reply")?;

    tokio::spawn(async move {
        while let Some(env) = out_rx.recv().await {
            if writer.send(&env).await.is_err() {
                break;
            }
        }
    });

    let result = loop {
        match reader.recv().await {
            Ok(Some(env)) => {
                let cmd = Command::Event {
                    player_id: player_id.clone(),
                    env,
                };
                if authority.send(cmd).is_err() {
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    let _ = authority.send(Command::Leave { player_id });
    result
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral(seed: u64) -> anyhow::Result<(ArenaServer, ArenaConfig)> {
    let mut cfg = ArenaConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        ..Default::default()
    };
    let server = ArenaServer::bind(cfg.clone()).await?.with_seed(seed);
    cfg.server_addr = server.local_addr()?.to_string();
    Ok((server, cfg))
}
