//! Configuration system.
//!
//! Loads arena configuration from JSON strings/files (file IO left to app).

use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Server listen address, e.g. `127.0.0.1:3000`.
    pub server_addr: String,
    /// Fixed tick rate of the client update loop.
    pub tick_hz: u32,
    /// World width in world units.
    #[serde(default = "default_world_width")]
    pub world_width: f64,
    /// World height in world units.
    #[serde(default = "default_world_height")]
    pub world_height: f64,
}

fn default_world_width() -> f64 {
    800.0
}

fn default_world_height() -> f64 {
    600.0
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3000".to_string(),
            tick_hz: 60,
            world_width: default_world_width(),
            world_height: default_world_height(),
        }
    }
}

impl ArenaConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Duration of one client tick in seconds.
    pub fn tick_secs(&self) -> f64 {
        1.0 / f64::from(self.tick_hz.max(1))
    }
}
