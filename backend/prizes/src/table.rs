//! # Weighted Tables
//!
//! Outcomes are laid end to end on `[0, total)`, each taking an interval as
//! wide as its weight. A uniform draw on that range lands in exactly one
//! interval, so each label comes up with probability `weight / total`.
//!
//! Tables can be written as `label:weight` pairs separated by commas, which is
//! how the server reads `SLOT_SYMBOLS` and `WHEEL_PRIZES`.
//! ```text
//! cherry:30,lemon:25,bell:20,star:15,diamond:7,seven:3
//! ```
use std::{collections::HashSet, fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrizeError {
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("Alignment probability must be within [0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("A spin needs at least one reel")]
    NoReels,

    #[error("Display strip needs at least two distinct outcomes with positive weight")]
    StripNeedsVariety,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub label: String,
    pub weight: f64,
}

impl Outcome {
    pub fn new(label: impl Into<String>, weight: f64) -> Self {
        Self {
            label: label.into(),
            weight,
        }
    }
}

/// A validated outcome set. Holding one means the total weight is positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrizeTable {
    outcomes: Vec<Outcome>,
    total: f64,
}

impl PrizeTable {
    pub fn new(outcomes: Vec<Outcome>) -> Result<Self, PrizeError> {
        let total = validate(&outcomes)?;

        Ok(Self { outcomes, total })
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        pick(&self.outcomes, self.total, rng)
    }

    /// Number of distinct labels that can actually be drawn.
    pub fn distinct_positive(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.weight > 0.0)
            .map(|outcome| outcome.label.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Draws one label from `outcomes`, failing when the set cannot form a
/// distribution.
pub fn select<'a, R: Rng + ?Sized>(
    outcomes: &'a [Outcome],
    rng: &mut R,
) -> Result<&'a str, PrizeError> {
    let total = validate(outcomes)?;

    Ok(pick(outcomes, total, rng))
}

fn validate(outcomes: &[Outcome]) -> Result<f64, PrizeError> {
    if outcomes.is_empty() {
        return Err(PrizeError::InvalidDistribution("no outcomes".into()));
    }

    for outcome in outcomes {
        if outcome.label.trim().is_empty() {
            return Err(PrizeError::InvalidDistribution("empty label".into()));
        }

        if !outcome.weight.is_finite() || outcome.weight < 0.0 {
            return Err(PrizeError::InvalidDistribution(format!(
                "weight {} for {}",
                outcome.weight, outcome.label
            )));
        }
    }

    let total: f64 = outcomes.iter().map(|outcome| outcome.weight).sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(PrizeError::InvalidDistribution(format!(
            "total weight {total}"
        )));
    }

    Ok(total)
}

fn pick<'a, R: Rng + ?Sized>(outcomes: &'a [Outcome], total: f64, rng: &mut R) -> &'a str {
    let r = rng.gen_range(0.0..total);
    let mut upper = 0.0;

    for outcome in outcomes.iter().filter(|outcome| outcome.weight > 0.0) {
        upper += outcome.weight;

        if r < upper {
            return &outcome.label;
        }
    }

    // summing can leave `upper` a hair under `total`
    outcomes
        .iter()
        .rev()
        .find(|outcome| outcome.weight > 0.0)
        .map_or("", |outcome| outcome.label.as_str())
}

impl FromStr for PrizeTable {
    type Err = PrizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let outcomes = s
            .split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (label, weight) = pair.rsplit_once(':').ok_or_else(|| {
                    PrizeError::InvalidDistribution(format!("expected label:weight, got {pair}"))
                })?;

                let weight = weight.trim().parse::<f64>().map_err(|e| {
                    PrizeError::InvalidDistribution(format!("weight for {label}: {e}"))
                })?;

                Ok(Outcome::new(label.trim(), weight))
            })
            .collect::<Result<Vec<_>, PrizeError>>()?;

        Self::new(outcomes)
    }
}

impl fmt::Display for PrizeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, outcome) in self.outcomes.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", outcome.label, outcome.weight)?;
        }

        Ok(())
    }
}
