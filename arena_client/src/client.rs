//! Client implementation.
//!
//! The client maintains:
//! - A transport session (background socket I/O, ordered inbound queue)
//! - The event dispatcher wired to the sync core
//! - The sync core itself, with its motion and display services
//! - The currently held input keys
//!
//! Everything here runs on the caller's task. Inbound events are drained by
//! [`GameClient::pump`] and local updates run in [`GameClient::tick`]; the two
//! never interleave.

use arena_shared::{
    config::ArenaConfig,
    net::{Envelope, PlayerId},
    physics::{ArcadeMotion, Bounds, MotionBackend},
    render::{DisplayBackend, HeadlessDisplay},
};
use tracing::{debug, warn};

use crate::{
    dispatch::Dispatcher,
    error::SessionError,
    input::InputState,
    session::Session,
    sync::{dispatcher, Outbound, SyncCore},
};

/// High-level game client.
pub struct GameClient<M = ArcadeMotion, D = HeadlessDisplay> {
    session: Session,
    dispatcher: Dispatcher<SyncCore<M, D>>,
    core: SyncCore<M, D>,
    pub input: InputState,
    tick: u64,
    tick_secs: f64,
}

impl GameClient {
    /// Connects to the configured server with headless services.
    pub async fn connect(cfg: &ArenaConfig) -> anyhow::Result<Self> {
        let session = Session::connect(&cfg.server_addr).await?;
        let motion = ArcadeMotion::new(Bounds::new(cfg.world_width, cfg.world_height));
        Self::with_services(session, cfg, motion, HeadlessDisplay::new())
    }
}

impl<M, D> GameClient<M, D>
where
    M: MotionBackend + 'static,
    D: DisplayBackend + 'static,
{
    /// Builds a client around an established session and injected services.
    pub fn with_services(
        session: Session,
        cfg: &ArenaConfig,
        motion: M,
        display: D,
    ) -> anyhow::Result<Self> {
        let core = SyncCore::new(session.id().clone(), motion, display);
        Ok(Self {
            session,
            dispatcher: dispatcher()?,
            core,
            input: InputState::default(),
            tick: 0,
            tick_secs: cfg.tick_secs(),
        })
    }

    pub fn session_id(&self) -> &PlayerId {
        self.session.id()
    }

    pub fn core(&self) -> &SyncCore<M, D> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut SyncCore<M, D> {
        &mut self.core
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Processes every inbound event already queued. Returns how many.
    pub fn pump(&mut self) -> Result<usize, SessionError> {
        let mut handled = 0;
        loop {
            match self.session.try_recv() {
                Ok(Some(env)) => {
                    self.handle(&env);
                    handled += 1;
                }
                Ok(None) => return Ok(handled),
                Err(e) => return Err(self.closed(e)),
            }
        }
    }

    /// Waits for one inbound event and processes it.
    pub async fn recv(&mut self) -> Result<Envelope, SessionError> {
        match self.session.recv().await {
            Ok(env) => {
                self.handle(&env);
                Ok(env)
            }
            Err(e) => Err(self.closed(e)),
        }
    }

    fn closed(&mut self, e: SessionError) -> SessionError {
        if matches!(e, SessionError::Closed) {
            self.core.on_session_closed();
        }
        e
    }

    fn handle(&mut self, env: &Envelope) {
        if let Err(e) = self.dispatcher.dispatch(&mut self.core, env) {
            warn!(event = %env.event, error = %e, "Inbound event rejected");
        }
    }

    /// Advances one client tick: integrate motion, run the sync core, send
    /// what it produced.
    pub fn tick(&mut self) -> Result<Vec<Outbound>, SessionError> {
        self.core.motion_mut().step(self.tick_secs);
        let out = self.core.tick(self.input);
        for ev in &out {
            let env = ev.to_envelope().map_err(|source| SessionError::Encode {
                event: ev.event().to_string(),
                source,
            })?;
            debug!(event = %env.event, tick = self.tick, "Emit");
            self.session.send(env)?;
        }
        self.tick += 1;
        Ok(out)
    }

    /// Status lines for the console.
    pub fn status(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(format!("Session: {}", self.session_id()));
        out.push(format!("Tick: {}", self.tick));
        match self.core.local_pose() {
            Some(p) => out.push(format!(
                "Craft: x={:.1} y={:.1} rot={:.2}",
                p.x, p.y, p.rotation
            )),
            None => out.push("Craft: not spawned".to_string()),
        }
        out.push(format!("Input: {:?}", self.input));
        out.push(format!("Remote players: {}", self.core.registry().len()));
        let score = self.core.score();
        out.push(format!("Score: blue={} red={}", score.blue, score.red));
        if let Some(star) = self.core.star() {
            out.push(format!(
                "Star: x={:.1} y={:.1}{}",
                star.location.x,
                star.location.y,
                if star.collected { " (collected)" } else { "" }
            ));
        }
        out
    }
}
