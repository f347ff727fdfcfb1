//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! [`DisplayBackend`] is what the client core pushes plain values into.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::net::Team;

/// Handle to a placed sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteHandle(pub u64);

/// Which asset a sprite shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpriteKind {
    /// The locally controlled craft.
    Ship,
    /// A remotely controlled craft.
    OtherPlayer,
    Star,
}

/// RGB tint applied to a sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tint(pub u32);

impl Tint {
    pub const BLUE: Self = Self(0x0000ff);
    pub const RED: Self = Self(0xff0000);
}

impl From<Team> for Tint {
    fn from(team: Team) -> Self {
        match team {
            Team::Blue => Tint::BLUE,
            Team::Red => Tint::RED,
        }
    }
}

/// The two score labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreLabel {
    Blue,
    Red,
}

/// A minimal display API.
pub trait DisplayBackend {
    fn set_text(&mut self, label: ScoreLabel, text: &str);
    fn place_sprite(&mut self, x: f64, y: f64, kind: SpriteKind, tint: Option<Tint>)
        -> SpriteHandle;
    fn set_sprite_rotation(&mut self, sprite: SpriteHandle, rotation: f64);
    fn set_sprite_position(&mut self, sprite: SpriteHandle, x: f64, y: f64);
    fn remove_sprite(&mut self, sprite: SpriteHandle);
}

/// A live sprite as seen by [`HeadlessDisplay`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteView {
    pub kind: SpriteKind,
    pub tint: Option<Tint>,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

/// An in-memory display useful for headless clients and tests.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    next_handle: u64,
    sprites: HashMap<SpriteHandle, SpriteView>,
    texts: HashMap<ScoreLabel, String>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sprite(&self, sprite: SpriteHandle) -> Option<&SpriteView> {
        self.sprites.get(&sprite)
    }

    pub fn text(&self, label: ScoreLabel) -> Option<&str> {
        self.texts.get(&label).map(String::as_str)
    }

    /// Number of live sprites of a kind.
    pub fn count(&self, kind: SpriteKind) -> usize {
        self.sprites.values().filter(|s| s.kind == kind).count()
    }

    /// Total number of live sprites.
    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

impl DisplayBackend for HeadlessDisplay {
    fn set_text(&mut self, label: ScoreLabel, text: &str) {
        trace!(?label, text, "set text");
        self.texts.insert(label, text.to_string());
    }

    fn place_sprite(
        &mut self,
        x: f64,
        y: f64,
        kind: SpriteKind,
        tint: Option<Tint>,
    ) -> SpriteHandle {
        let handle = SpriteHandle(self.next_handle);
        self.next_handle += 1;
        self.sprites.insert(
            handle,
            SpriteView {
                kind,
                tint,
                x,
                y,
                rotation: 0.0,
            },
        );
        trace!(?handle, ?kind, x, y, "place sprite");
        handle
    }

    fn set_sprite_rotation(&mut self, sprite: SpriteHandle, rotation: f64) {
        if let Some(s) = self.sprites.get_mut(&sprite) {
            s.rotation = rotation;
        }
    }

    fn set_sprite_position(&mut self, sprite: SpriteHandle, x: f64, y: f64) {
        if let Some(s) = self.sprites.get_mut(&sprite) {
            s.x = x;
            s.y = y;
        }
    }

    fn remove_sprite(&mut self, sprite: SpriteHandle) {
        trace!(handle = ?sprite, "remove sprite");
        self.sprites.remove(&sprite);
    }
}
