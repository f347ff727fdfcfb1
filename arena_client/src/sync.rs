//! State-synchronization core.
//!
//! [`SyncCore`] owns everything the client knows about the match: the local
//! craft, the remote player registry, the score and the star. It is driven
//! from two places, both on the same task:
//! - [`SyncCore::tick`] once per frame, which applies input to the local
//!   craft and shapes outbound events;
//! - the `on_*` handlers, once per inbound event, wired up by
//!   [`dispatcher`].
//!
//! Motion integration and drawing are delegated to the injected
//! [`MotionBackend`] and [`DisplayBackend`].

use arena_shared::{
    net::{
        events, Envelope, PlayerId, PlayerMoved, PlayerMovement, PlayerState, Roster, ScoreState,
        StarLocation, Team,
    },
    physics::{BodyDesc, BodyId, MotionBackend, Pose},
    render::{DisplayBackend, ScoreLabel, SpriteHandle, SpriteKind, Tint},
};
use tracing::{debug, info, warn};

use crate::{dispatch::Dispatcher, error::SyncError, input::InputState, registry::EntityRegistry};

/// Thrust while `up` is held, in units/s².
pub const THRUST: f64 = 100.0;

/// Offset between the craft's rotation and its thrust direction, in radians.
/// Matches the sprite artwork, which points along +y.
pub const HEADING_OFFSET: f64 = 1.5;

/// How far past the world edge the craft travels before it wraps.
pub const WRAP_MARGIN: f64 = 5.0;

/// The session's own craft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalEntity {
    pub team: Team,
    pub body: BodyId,
    pub sprite: SpriteHandle,
}

/// Pose compared against on the next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LocalSnapshot {
    x: f64,
    y: f64,
    rotation: f64,
}

impl From<Pose> for LocalSnapshot {
    fn from(p: Pose) -> Self {
        Self {
            x: p.x,
            y: p.y,
            rotation: p.rotation,
        }
    }
}

/// The live collectible star.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    pub location: StarLocation,
    pub body: BodyId,
    pub sprite: SpriteHandle,
    /// Set once `starCollected` has been sent for this star.
    pub collected: bool,
}

/// Events the core asks the session to send.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outbound {
    PlayerMovement(PlayerMovement),
    StarCollected,
}

impl Outbound {
    pub fn event(&self) -> &'static str {
        match self {
            Outbound::PlayerMovement(_) => events::PLAYER_MOVEMENT,
            Outbound::StarCollected => events::STAR_COLLECTED,
        }
    }

    pub fn to_envelope(&self) -> serde_json::Result<Envelope> {
        match self {
            Outbound::PlayerMovement(m) => Envelope::new(self.event(), m),
            Outbound::StarCollected => Ok(Envelope::bare(self.event())),
        }
    }
}

/// Client-side match state plus the services it drives.
pub struct SyncCore<M, D> {
    session_id: PlayerId,
    motion: M,
    display: D,
    registry: EntityRegistry,
    local: Option<LocalEntity>,
    snapshot: Option<LocalSnapshot>,
    score: ScoreState,
    star: Option<Star>,
}

impl<M: MotionBackend, D: DisplayBackend> SyncCore<M, D> {
    pub fn new(session_id: PlayerId, motion: M, display: D) -> Self {
        Self {
            session_id,
            motion,
            display,
            registry: EntityRegistry::new(),
            local: None,
            snapshot: None,
            score: ScoreState::default(),
            star: None,
        }
    }

    pub fn session_id(&self) -> &PlayerId {
        &self.session_id
    }

    pub fn motion(&self) -> &M {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut M {
        &mut self.motion
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn local(&self) -> Option<&LocalEntity> {
        self.local.as_ref()
    }

    /// Current pose of the local craft, if it exists.
    pub fn local_pose(&self) -> Option<Pose> {
        self.local.and_then(|l| self.motion.pose(l.body))
    }

    pub fn score(&self) -> ScoreState {
        self.score
    }

    pub fn star(&self) -> Option<&Star> {
        self.star.as_ref()
    }

    /// Runs one local update and returns what should be sent.
    ///
    /// Does nothing until the roster has assigned the local craft.
    pub fn tick(&mut self, input: InputState) -> Vec<Outbound> {
        let Some(local) = self.local else {
            return Vec::new();
        };
        let body = local.body;

        self.motion
            .set_angular_velocity(body, input.angular_velocity());

        let Some(pose) = self.motion.pose(body) else {
            warn!(?body, "Local body missing from motion backend");
            return Vec::new();
        };
        if input.up {
            self.motion
                .set_acceleration_from_rotation(body, pose.rotation + HEADING_OFFSET, THRUST);
        } else {
            self.motion.clear_acceleration(body);
        }

        self.motion.wrap_to_bounds(body, WRAP_MARGIN);

        let mut out = Vec::new();
        let pose = self.motion.pose(body).unwrap_or(pose);
        self.display.set_sprite_rotation(local.sprite, pose.rotation);
        self.display.set_sprite_position(local.sprite, pose.x, pose.y);

        let current = LocalSnapshot::from(pose);
        // Compared against the previous tick, not the last pose sent.
        let changed = match self.snapshot {
            None => true,
            Some(prev) => prev != current,
        };
        if changed {
            out.push(Outbound::PlayerMovement(PlayerMovement {
                x: pose.x,
                y: pose.y,
                rotation: pose.rotation,
            }));
        }
        self.snapshot = Some(current);

        if let Some(star) = self.star.as_mut() {
            if !star.collected && self.motion.overlaps(body, star.body) {
                star.collected = true;
                debug!(x = star.location.x, y = star.location.y, "Star collected");
                out.push(Outbound::StarCollected);
            }
        }

        out
    }

    /// `currentPlayers`: the roster at join time.
    pub fn on_current_players(&mut self, roster: Roster) -> Result<(), SyncError> {
        info!(players = roster.len(), "Roster received");
        for state in roster.into_values() {
            if let Err(e) = self.admit(&state) {
                warn!(player_id = %state.player_id, error = %e, "Roster entry rejected");
            }
        }
        Ok(())
    }

    /// `newPlayer`: someone joined after us.
    pub fn on_new_player(&mut self, state: PlayerState) -> Result<(), SyncError> {
        info!(player_id = %state.player_id, team = ?state.team, "Player joined");
        self.admit(&state)
    }

    /// `disconnected`: someone left.
    pub fn on_disconnected(&mut self, player_id: PlayerId) -> Result<(), SyncError> {
        match self.registry.remove(&mut self.display, &player_id) {
            Ok(()) => info!(player_id = %player_id, "Player left"),
            Err(e) => debug!(error = %e, "Disconnect ignored"),
        }
        Ok(())
    }

    /// `playerMoved`: a remote craft's new pose.
    pub fn on_player_moved(&mut self, moved: PlayerMoved) -> Result<(), SyncError> {
        let pose = Pose {
            x: moved.x,
            y: moved.y,
            rotation: moved.rotation,
        };
        if let Err(e) = self
            .registry
            .update_pose(&mut self.display, &moved.player_id, pose)
        {
            debug!(error = %e, "Move ignored");
        }
        Ok(())
    }

    /// `scoreUpdate`: both team scores, replacing the old ones.
    pub fn on_score_update(&mut self, score: ScoreState) -> Result<(), SyncError> {
        self.score = score;
        self.display
            .set_text(ScoreLabel::Blue, &format!("Blue: {}", score.blue));
        self.display
            .set_text(ScoreLabel::Red, &format!("Red: {}", score.red));
        Ok(())
    }

    /// `starLocation`: replaces the star. The old one is destroyed first.
    pub fn on_star_location(&mut self, location: StarLocation) -> Result<(), SyncError> {
        if let Some(old) = self.star.take() {
            self.motion.despawn_body(old.body);
            self.display.remove_sprite(old.sprite);
        }
        let body = self.motion.spawn_body(
            Pose {
                x: location.x,
                y: location.y,
                rotation: 0.0,
            },
            BodyDesc::STAR,
        );
        let sprite = self
            .display
            .place_sprite(location.x, location.y, SpriteKind::Star, None);
        self.star = Some(Star {
            location,
            body,
            sprite,
            collected: false,
        });
        debug!(x = location.x, y = location.y, "Star placed");
        Ok(())
    }

    /// Drops every remote proxy once the session has ended. The local craft
    /// and star stay as they were last seen.
    pub fn on_session_closed(&mut self) {
        info!(players = self.registry.len(), "Session closed, releasing remote players");
        self.registry.clear(&mut self.display);
    }

    fn admit(&mut self, state: &PlayerState) -> Result<(), SyncError> {
        if state.player_id == self.session_id {
            self.spawn_local(state)
        } else {
            self.registry.upsert_remote(&mut self.display, state)
        }
    }

    fn spawn_local(&mut self, state: &PlayerState) -> Result<(), SyncError> {
        if self.local.is_some() {
            return Err(SyncError::DuplicateEntity(state.player_id.clone()));
        }
        let pose = Pose {
            x: state.x,
            y: state.y,
            rotation: state.rotation,
        };
        let body = self.motion.spawn_body(pose, BodyDesc::CRAFT);
        let sprite = self
            .display
            .place_sprite(state.x, state.y, SpriteKind::Ship, Some(Tint::from(state.team)));
        self.display.set_sprite_rotation(sprite, state.rotation);
        self.local = Some(LocalEntity {
            team: state.team,
            body,
            sprite,
        });
        info!(player_id = %state.player_id, team = ?state.team, "Local craft spawned");
        Ok(())
    }
}

/// Builds the dispatcher wiring every inbound event to its handler.
pub fn dispatcher<M, D>() -> Result<Dispatcher<SyncCore<M, D>>, SyncError>
where
    M: MotionBackend + 'static,
    D: DisplayBackend + 'static,
{
    let mut d = Dispatcher::new();
    d.on(events::CURRENT_PLAYERS, SyncCore::on_current_players)?;
    d.on(events::NEW_PLAYER, SyncCore::on_new_player)?;
    d.on(events::DISCONNECTED, SyncCore::on_disconnected)?;
    d.on(events::PLAYER_MOVED, SyncCore::on_player_moved)?;
    d.on(events::SCORE_UPDATE, SyncCore::on_score_update)?;
    d.on(events::STAR_LOCATION, SyncCore::on_star_location)?;
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::{
        physics::{ArcadeMotion, Bounds},
        render::HeadlessDisplay,
    };
    use serde_json::json;

    type Core = SyncCore<ArcadeMotion, HeadlessDisplay>;

    fn core() -> Core {
        SyncCore::new(
            PlayerId::new("me"),
            ArcadeMotion::new(Bounds::new(800.0, 600.0)),
            HeadlessDisplay::new(),
        )
    }

    fn player(id: &str, team: Team, x: f64, y: f64) -> PlayerState {
        PlayerState {
            player_id: PlayerId::new(id),
            team,
            x,
            y,
            rotation: 0.0,
        }
    }

    fn roster(players: &[PlayerState]) -> Roster {
        players
            .iter()
            .map(|p| (p.player_id.clone(), p.clone()))
            .collect()
    }

    fn joined() -> Core {
        let mut c = core();
        c.on_current_players(roster(&[
            player("me", Team::Blue, 100.0, 100.0),
            player("other", Team::Red, 300.0, 300.0),
        ]))
        .unwrap();
        c
    }

    fn movements(out: &[Outbound]) -> Vec<PlayerMovement> {
        out.iter()
            .filter_map(|o| match o {
                Outbound::PlayerMovement(m) => Some(*m),
                Outbound::StarCollected => None,
            })
            .collect()
    }

    #[test]
    fn tick_without_local_craft_is_a_no_op() {
        let mut c = core();
        assert!(c.tick(InputState { up: true, ..Default::default() }).is_empty());
        assert!(c.motion().is_empty());
    }

    #[test]
    fn roster_spawns_local_craft_and_remote_proxies() {
        let c = joined();
        let local = c.local().unwrap();
        assert_eq!(local.team, Team::Blue);
        assert_eq!(c.registry().len(), 1);
        assert!(c.registry().contains(&PlayerId::new("other")));
        assert!(!c.registry().contains(&PlayerId::new("me")));
        assert_eq!(c.display().count(SpriteKind::Ship), 1);
        assert_eq!(c.display().count(SpriteKind::OtherPlayer), 1);
        assert_eq!(
            c.display().sprite(local.sprite).unwrap().tint,
            Some(Tint::BLUE)
        );
    }

    #[test]
    fn repeated_roster_never_duplicates_the_local_craft() {
        let mut c = joined();
        c.on_current_players(roster(&[
            player("me", Team::Blue, 5.0, 5.0),
            player("other", Team::Red, 300.0, 300.0),
            player("late", Team::Blue, 50.0, 50.0),
        ]))
        .unwrap();

        assert_eq!(c.display().count(SpriteKind::Ship), 1);
        assert_eq!(c.motion().len(), 1);
        assert_eq!(c.local_pose().unwrap().x, 100.0);
        assert_eq!(c.registry().len(), 2);
    }

    #[test]
    fn first_tick_emits_then_unchanged_ticks_stay_silent() {
        let mut c = joined();
        let first = movements(&c.tick(InputState::default()));
        assert_eq!(
            first,
            vec![PlayerMovement {
                x: 100.0,
                y: 100.0,
                rotation: 0.0
            }]
        );
        for _ in 0..5 {
            assert!(c.tick(InputState::default()).is_empty());
        }
    }

    #[test]
    fn changed_pose_emits_exactly_one_movement_with_new_values() {
        let mut c = joined();
        c.tick(InputState::default());

        let body = c.local().unwrap().body;
        c.motion_mut().set_position(body, 120.0, 90.0);
        let out = movements(&c.tick(InputState::default()));
        assert_eq!(
            out,
            vec![PlayerMovement {
                x: 120.0,
                y: 90.0,
                rotation: 0.0
            }]
        );

        c.motion_mut().set_rotation(body, 0.25);
        let out = movements(&c.tick(InputState::default()));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rotation, 0.25);
    }

    #[test]
    fn oscillating_pose_emits_on_every_change() {
        let mut c = joined();
        c.tick(InputState::default());
        let body = c.local().unwrap().body;

        c.motion_mut().set_position(body, 101.0, 100.0);
        assert_eq!(movements(&c.tick(InputState::default())).len(), 1);
        c.motion_mut().set_position(body, 100.0, 100.0);
        assert_eq!(movements(&c.tick(InputState::default())).len(), 1);
    }

    #[test]
    fn input_sets_turn_and_thrust_along_offset_heading() {
        let mut c = joined();
        let body = c.local().unwrap().body;

        c.tick(InputState {
            left: true,
            right: true,
            up: true,
        });
        assert_eq!(c.motion().angular_velocity(body), Some(-150.0));
        let acc = c.motion().acceleration(body).unwrap();
        assert!((acc.x - HEADING_OFFSET.cos() * THRUST).abs() < 1e-9);
        assert!((acc.y - HEADING_OFFSET.sin() * THRUST).abs() < 1e-9);

        c.tick(InputState::default());
        assert_eq!(c.motion().angular_velocity(body), Some(0.0));
        assert_eq!(
            c.motion().acceleration(body),
            Some(arena_shared::math::Vec2::ZERO)
        );
    }

    #[test]
    fn tick_wraps_the_local_craft() {
        let mut c = joined();
        let body = c.local().unwrap().body;
        c.motion_mut().set_position(body, 806.0, 300.0);

        let out = movements(&c.tick(InputState::default()));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].x, -4.0);
        assert_eq!(c.local_pose().unwrap().x, -4.0);
    }

    #[test]
    fn wrap_pads_world_bounds_by_the_margin() {
        let mut c = joined();
        let body = c.local().unwrap().body;
        let before = c.tick(InputState::default());
        assert_eq!(movements(&before).len(), 1);

        // Inside the padded band: left alone.
        c.motion_mut().set_position(body, 803.0, 300.0);
        let out = movements(&c.tick(InputState::default()));
        assert_eq!(out[0].x, 803.0);
        assert_eq!(c.local_pose().unwrap().x, 803.0);

        // Past the padded edge: re-enters at the opposite padded edge.
        c.motion_mut().set_position(body, 806.0, 300.0);
        let out = movements(&c.tick(InputState::default()));
        assert_eq!(out[0].x, -4.0);
        assert_eq!(out[0].y, 300.0);
    }

    #[test]
    fn session_close_releases_remote_proxies() {
        let mut c = joined();
        c.on_new_player(player("p1", Team::Blue, 10.0, 20.0)).unwrap();
        assert_eq!(c.display().count(SpriteKind::OtherPlayer), 2);

        c.on_session_closed();
        assert!(c.registry().is_empty());
        assert_eq!(c.display().count(SpriteKind::OtherPlayer), 0);
        assert_eq!(c.display().count(SpriteKind::Ship), 1);
    }

    #[test]
    fn score_update_replaces_and_formats_text() {
        let mut c = core();
        c.on_score_update(ScoreState { blue: 10, red: 20 }).unwrap();
        c.on_score_update(ScoreState { blue: 3, red: 1 }).unwrap();
        assert_eq!(c.score(), ScoreState { blue: 3, red: 1 });
        assert_eq!(c.display().text(ScoreLabel::Blue), Some("Blue: 3"));
        assert_eq!(c.display().text(ScoreLabel::Red), Some("Red: 1"));
    }

    #[test]
    fn second_star_replaces_the_first() {
        let mut c = joined();
        c.on_star_location(StarLocation { x: 10.0, y: 10.0 }).unwrap();
        let first = *c.star().unwrap();
        c.on_star_location(StarLocation { x: 500.0, y: 400.0 })
            .unwrap();

        assert_eq!(c.display().count(SpriteKind::Star), 1);
        assert!(c.display().sprite(first.sprite).is_none());
        assert!(c.motion().pose(first.body).is_none());
        assert_eq!(c.star().unwrap().location, StarLocation { x: 500.0, y: 400.0 });
    }

    #[test]
    fn star_contact_fires_once_per_star() {
        let mut c = joined();
        c.on_star_location(StarLocation { x: 105.0, y: 100.0 })
            .unwrap();

        let first = c.tick(InputState::default());
        assert!(first.contains(&Outbound::StarCollected));
        for _ in 0..3 {
            assert!(!c.tick(InputState::default()).contains(&Outbound::StarCollected));
        }

        // A new star at the same place re-arms the watcher.
        c.on_star_location(StarLocation { x: 105.0, y: 100.0 })
            .unwrap();
        assert!(c.tick(InputState::default()).contains(&Outbound::StarCollected));
    }

    #[test]
    fn remote_lifecycle_through_events() {
        let mut c = joined();
        c.on_new_player(player("p1", Team::Blue, 10.0, 20.0)).unwrap();
        c.on_player_moved(PlayerMoved {
            player_id: PlayerId::new("p1"),
            x: 15.0,
            y: 25.0,
            rotation: 1.0,
        })
        .unwrap();

        let entity = c.registry().get(&PlayerId::new("p1")).unwrap().clone();
        let view = c.display().sprite(entity.sprite).unwrap();
        assert_eq!((view.x, view.y, view.rotation), (15.0, 25.0, 1.0));
        assert_eq!(view.tint, Some(Tint::BLUE));

        c.on_disconnected(PlayerId::new("p1")).unwrap();
        assert!(c.display().sprite(entity.sprite).is_none());

        // Late move for the departed player is dropped.
        c.on_player_moved(PlayerMoved {
            player_id: PlayerId::new("p1"),
            x: 1.0,
            y: 1.0,
            rotation: 0.0,
        })
        .unwrap();
        assert!(!c.registry().contains(&PlayerId::new("p1")));
    }

    #[test]
    fn duplicate_new_player_is_rejected() {
        let mut c = joined();
        let err = c
            .on_new_player(player("other", Team::Blue, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, SyncError::DuplicateEntity(_)));
        assert_eq!(c.display().count(SpriteKind::OtherPlayer), 1);
    }

    #[test]
    fn dispatcher_routes_wire_events() {
        let mut c = core();
        let mut d = dispatcher().unwrap();
        let env = |event: &str, data: serde_json::Value| Envelope {
            event: event.to_string(),
            data,
        };

        d.dispatch(
            &mut c,
            &env(
                events::CURRENT_PLAYERS,
                json!({"me": {"playerId": "me", "team": "red", "x": 50, "y": 60, "rotation": 0}}),
            ),
        )
        .unwrap();
        d.dispatch(&mut c, &env(events::SCORE_UPDATE, json!({"blue": 3, "red": 1})))
            .unwrap();
        d.dispatch(&mut c, &env(events::STAR_LOCATION, json!({"x": 400, "y": 300})))
            .unwrap();

        assert_eq!(c.local().unwrap().team, Team::Red);
        assert_eq!(c.display().text(ScoreLabel::Blue), Some("Blue: 3"));
        assert!(c.star().is_some());

        let err = d
            .dispatch(&mut c, &env(events::SCORE_UPDATE, json!({"blue": 4})))
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedPayload { .. }));
        assert_eq!(c.score(), ScoreState { blue: 3, red: 1 });
    }
}
