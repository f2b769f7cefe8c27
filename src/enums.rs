use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ─── ChallengeMode ───────────────────────────────────────────────────

/// How newly joined members prove they are human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeMode {
    /// A single inline button only the joining member may press.
    #[default]
    Button,
    /// An `a + b` question answered by replying to the challenge message.
    Arithmetic,
}

impl ChallengeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeMode::Button => "button",
            ChallengeMode::Arithmetic => "arithmetic",
        }
    }
}

impl fmt::Display for ChallengeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "button" | "click" => Ok(ChallengeMode::Button),
            "arithmetic" | "math" | "sum" => Ok(ChallengeMode::Arithmetic),
            other => Err(AppError::InvalidInput(format!("Unknown challenge mode: {}", other))),
        }
    }
}
