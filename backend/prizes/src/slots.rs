//! # Slot Machine
//!
//! ## Alignment Gate
//! Independent reels almost never line up with a realistic symbol table, so
//! a spin first flips a coin weighted by the alignment probability. Heads, a
//! single symbol is drawn and copied onto every reel. Tails, each reel draws
//! on its own and may still line up by chance.
//!
//! Whether a spin won is only ever read off the labels, never off the coin.
//!
//! ## Display Strips
//! The frontend scrolls a strip of symbols past each reel window before it
//! settles. Two equal symbols in a row look like the reel stalled, so strips
//! redraw any symbol equal to its neighbour.
use rand::Rng;
use serde::Serialize;

use crate::table::{PrizeError, PrizeTable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpinResult {
    labels: Vec<String>,
    #[serde(skip)]
    forced: bool,
}

impl SpinResult {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn into_labels(self) -> Vec<String> {
        self.labels
    }

    /// Every reel shows the same label.
    pub fn is_win(&self) -> bool {
        !self.labels.is_empty() && self.labels.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// The gate copied one draw across the reels.
    pub fn forced(&self) -> bool {
        self.forced
    }
}

pub fn spin<R: Rng + ?Sized>(
    table: &PrizeTable,
    reel_count: usize,
    align_probability: f64,
    rng: &mut R,
) -> Result<SpinResult, PrizeError> {
    if reel_count == 0 {
        return Err(PrizeError::NoReels);
    }

    if !(0.0..=1.0).contains(&align_probability) {
        return Err(PrizeError::InvalidProbability(align_probability));
    }

    if rng.gen_bool(align_probability) {
        let label = table.select(rng).to_owned();

        return Ok(SpinResult {
            labels: vec![label; reel_count],
            forced: true,
        });
    }

    let labels = (0..reel_count)
        .map(|_| table.select(rng).to_owned())
        .collect();

    Ok(SpinResult {
        labels,
        forced: false,
    })
}

/// Builds `len` labels with no two neighbours equal. With `landing` set the
/// strip ends on it, so the animation comes to rest on the real result.
pub fn display_strip<R: Rng + ?Sized>(
    table: &PrizeTable,
    len: usize,
    landing: Option<&str>,
    rng: &mut R,
) -> Result<Vec<String>, PrizeError> {
    if len == 0 {
        return Ok(Vec::new());
    }

    if len > 1 && table.distinct_positive() < 2 {
        return Err(PrizeError::StripNeedsVariety);
    }

    // built from the landing end backwards, then flipped
    let mut strip = Vec::with_capacity(len);
    strip.push(match landing {
        Some(label) => label.to_owned(),
        None => table.select(rng).to_owned(),
    });

    while strip.len() < len {
        let previous = &strip[strip.len() - 1];

        let mut next = table.select(rng);
        while next == previous {
            next = table.select(rng);
        }

        strip.push(next.to_owned());
    }

    if landing.is_some() {
        strip.reverse();
    }

    Ok(strip)
}
