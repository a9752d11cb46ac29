//! Operating mode definitions.

use crate::error::ReplayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating mode, deciding whether live traffic and recording are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every request goes to the network; fixtures are neither read nor written
    Bloody,
    /// Replay when a fixture exists, otherwise go live without recording
    Cheat,
    /// Replay when a fixture exists, otherwise go live and record the response
    Record,
    /// Replay only; a request without a fixture fails
    #[default]
    Replay,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Bloody, Mode::Cheat, Mode::Record, Mode::Replay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Bloody => "bloody",
            Mode::Cheat => "cheat",
            Mode::Record => "record",
            Mode::Replay => "replay",
        }
    }

    /// Whether requests may reach the live transport after a fixture miss.
    pub fn allows_network(&self) -> bool {
        !matches!(self, Mode::Replay)
    }

    /// Whether live responses are captured into the catalog.
    pub fn records(&self) -> bool {
        matches!(self, Mode::Record)
    }

    /// Whether the catalog is consulted at all.
    pub fn uses_fixtures(&self) -> bool {
        !matches!(self, Mode::Bloody)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| {
                ReplayError::Configuration(format!(
                    "Unknown mode '{s}'. Expected one of: bloody, cheat, record, replay"
                ))
            })
    }
}
