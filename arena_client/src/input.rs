//! Input handling.
//!
//! In a real client this would integrate with windowing and keyboard state.
//! Here it is the three directional signals the sync core polls once per tick.

/// Turn rate in degrees per second while a turn key is held.
pub const TURN_RATE: f64 = 150.0;

/// Directional key state at a moment in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
}

impl InputState {
    /// Angular velocity requested by the turn keys. Left wins over right.
    pub fn angular_velocity(self) -> f64 {
        if self.left {
            -TURN_RATE
        } else if self.right {
            TURN_RATE
        } else {
            0.0
        }
    }

    /// Applies a console word to the held keys.
    ///
    /// `left`/`right` hold one turn key and release the other, `up` toggles
    /// thrust, `stop` releases everything. Returns `false` for other words.
    pub fn apply_word(&mut self, word: &str) -> bool {
        match word {
            "left" => {
                self.left = true;
                self.right = false;
            }
            "right" => {
                self.left = false;
                self.right = true;
            }
            "straight" => {
                self.left = false;
                self.right = false;
            }
            "up" => self.up = !self.up,
            "stop" => *self = Self::default(),
            _ => return false,
        }
        true
    }
}
