use std::fmt;
use std::str::FromStr;

use rand::Rng;
use teloxide::types::UserId;

use crate::enums::ChallengeMode;
use crate::error::AppError;

const VERIFY_PREFIX: &str = "verify_";

/// Arithmetic operands are drawn from this inclusive range.
pub const OPERAND_MIN: i64 = 1;
pub const OPERAND_MAX: i64 = 10;

/// The question put to a joining member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Challenge {
    Button,
    Arithmetic {
        a: i64,
        b: i64,
    },
}

impl Challenge {
    /// Draw a fresh challenge of the given kind.
    pub fn generate(mode: ChallengeMode) -> Self {
        match mode {
            ChallengeMode::Button => Challenge::Button,
            ChallengeMode::Arithmetic => {
                let mut rng = rand::rng();
                Challenge::Arithmetic {
                    a: rng.random_range(OPERAND_MIN..=OPERAND_MAX),
                    b: rng.random_range(OPERAND_MIN..=OPERAND_MAX),
                }
            }
        }
    }

    pub fn expected_answer(&self) -> Option<i64> {
        match self {
            Challenge::Button => None,
            Challenge::Arithmetic { a, b } => Some(a + b),
        }
    }
}

/// Parse a typed answer. Surrounding whitespace is allowed, anything else
/// that is not an integer yields `None`.
pub fn parse_answer(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Inline button payloads understood by the verification flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// `verify_<member id>`: only that member may press it.
    Verify(UserId),
}

impl CallbackAction {
    pub fn target(&self) -> UserId {
        match self {
            CallbackAction::Verify(id) => *id,
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Verify(id) => write!(f, "{}{}", VERIFY_PREFIX, id.0),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw_id = s
            .strip_prefix(VERIFY_PREFIX)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown callback payload: {}", s)))?;

        // Reject signs and whitespace so the id round-trips exactly
        if raw_id.is_empty() || !raw_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::InvalidInput(format!("Malformed member id: {}", raw_id)));
        }

        let id: u64 = raw_id
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Malformed member id: {}", raw_id)))?;

        Ok(CallbackAction::Verify(UserId(id)))
    }
}
