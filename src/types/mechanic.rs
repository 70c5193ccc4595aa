//! Reward mechanic types
//!
//! A mechanic converts purchases of a matching item into loyalty points.
//! `MechanicRequest` is the unvalidated wire shape; `Mechanic` only exists
//! once every field has been checked.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LoyaltyError;

/// How a mechanic's reward is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewardType {
    /// Flat points granted once per matching order line (token `pt`)
    Points,

    /// Percentage of the whole order value, granted once per order (token `%`)
    Percent,
}

impl RewardType {
    /// The wire token for this reward type
    pub fn as_token(&self) -> &'static str {
        match self {
            RewardType::Points => "pt",
            RewardType::Percent => "%",
        }
    }
}

impl FromStr for RewardType {
    type Err = LoyaltyError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "pt" => Ok(RewardType::Points),
            "%" => Ok(RewardType::Percent),
            other => Err(LoyaltyError::invalid_input(
                "reward_type",
                format!("unrecognized token '{}', expected 'pt' or '%'", other),
            )),
        }
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Mechanic registration request as received from a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicRequest {
    #[serde(rename = "match")]
    pub match_key: String,
    #[serde(default)]
    pub reward_type: String,
    #[serde(default)]
    pub reward: Decimal,
}

impl MechanicRequest {
    pub fn new(match_key: &str, reward_type: &str, reward: Decimal) -> Self {
        Self {
            match_key: match_key.to_string(),
            reward_type: reward_type.to_string(),
            reward,
        }
    }
}

/// A validated, immutable reward rule
#[derive(Debug, Clone, PartialEq)]
pub struct Mechanic {
    /// Item key this mechanic is triggered by (unique across the registry)
    pub match_key: String,
    pub reward_type: RewardType,
    /// Always greater than zero
    pub reward: Decimal,
}

impl TryFrom<MechanicRequest> for Mechanic {
    type Error = LoyaltyError;

    fn try_from(request: MechanicRequest) -> Result<Self, Self::Error> {
        if request.match_key.trim().is_empty() {
            return Err(LoyaltyError::invalid_input("match", "must not be empty"));
        }

        let reward_type = request.reward_type.parse::<RewardType>()?;

        if request.reward <= Decimal::ZERO {
            return Err(LoyaltyError::invalid_input(
                "reward",
                format!("must be greater than zero, got {}", request.reward),
            ));
        }

        Ok(Mechanic {
            match_key: request.match_key,
            reward_type,
            reward: request.reward,
        })
    }
}
