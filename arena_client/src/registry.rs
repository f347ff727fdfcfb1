//! Entity registry.
//!
//! Maps remote player ids to the proxy sprites that stand in for them. The
//! registry is the only owner of those sprites: every proxy it creates is
//! released through [`EntityRegistry::remove`] or [`EntityRegistry::clear`].

use std::collections::HashMap;

use arena_shared::{
    net::{PlayerId, PlayerState, Team},
    physics::Pose,
    render::{DisplayBackend, SpriteHandle, SpriteKind, Tint},
};

use crate::error::SyncError;

/// A remotely controlled craft.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntity {
    pub player_id: PlayerId,
    pub team: Team,
    pub tint: Tint,
    pub sprite: SpriteHandle,
    /// Last pose written to the proxy.
    pub pose: Pose,
}

/// Remote player proxies keyed by player id.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<PlayerId, RemoteEntity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs the proxy for a player seen for the first time.
    ///
    /// An existing entry is never replaced; the call is rejected instead so
    /// the old proxy cannot be orphaned.
    pub fn upsert_remote<D>(&mut self, display: &mut D, state: &PlayerState) -> Result<(), SyncError>
    where
        D: DisplayBackend + ?Sized,
    {
        if self.entities.contains_key(&state.player_id) {
            return Err(SyncError::DuplicateEntity(state.player_id.clone()));
        }
        let tint = Tint::from(state.team);
        let sprite = display.place_sprite(state.x, state.y, SpriteKind::OtherPlayer, Some(tint));
        display.set_sprite_rotation(sprite, state.rotation);
        self.entities.insert(
            state.player_id.clone(),
            RemoteEntity {
                player_id: state.player_id.clone(),
                team: state.team,
                tint,
                sprite,
                pose: Pose {
                    x: state.x,
                    y: state.y,
                    rotation: state.rotation,
                },
            },
        );
        Ok(())
    }

    /// Writes rotation, then position, to a player's proxy.
    pub fn update_pose<D>(
        &mut self,
        display: &mut D,
        player_id: &PlayerId,
        pose: Pose,
    ) -> Result<(), SyncError>
    where
        D: DisplayBackend + ?Sized,
    {
        let entity = self
            .entities
            .get_mut(player_id)
            .ok_or_else(|| SyncError::UnknownEntity(player_id.clone()))?;
        display.set_sprite_rotation(entity.sprite, pose.rotation);
        display.set_sprite_position(entity.sprite, pose.x, pose.y);
        entity.pose = pose;
        Ok(())
    }

    /// Destroys a player's proxy and forgets the player.
    pub fn remove<D>(&mut self, display: &mut D, player_id: &PlayerId) -> Result<(), SyncError>
    where
        D: DisplayBackend + ?Sized,
    {
        let entity = self
            .entities
            .remove(player_id)
            .ok_or_else(|| SyncError::UnknownEntity(player_id.clone()))?;
        display.remove_sprite(entity.sprite);
        Ok(())
    }

    /// Destroys every proxy.
    pub fn clear<D>(&mut self, display: &mut D)
    where
        D: DisplayBackend + ?Sized,
    {
        for (_, entity) in self.entities.drain() {
            display.remove_sprite(entity.sprite);
        }
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&RemoteEntity> {
        self.entities.get(player_id)
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.entities.contains_key(player_id)
    }

    /// Visits every entry, in no particular order.
    pub fn for_each(&self, mut visitor: impl FnMut(&PlayerId, &RemoteEntity)) {
        for (id, entity) in &self.entities {
            visitor(id, entity);
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
