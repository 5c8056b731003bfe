//! # Prizes
//!
//! Outcome selection shared by the booth server and its tests. Nothing in
//! here touches the network or the store.
//!
//!
//!
//! ## Pieces
//!
//! - [`table`]: weighted outcome tables and the interval based selector
//! - [`slots`]: the alignment gate behind the slot machine plus display strips
//! - [`raffle`]: raffle entries and the ticket weighted winner draw
//!
//!
//!
//! ## Randomness
//!
//! Every draw takes `&mut R where R: Rng`. The server owns exactly one
//! [`ChaCha8Rng`] built by [`rng`], so a fixed `RNG_SEED` replays the same
//! sequence of spins and raffle picks. Tests do the same with literal seeds.
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub mod raffle;
pub mod slots;
pub mod table;

pub use raffle::{DrawError, Entry, pick_winner};
pub use slots::{SpinResult, display_strip, spin};
pub use table::{Outcome, PrizeError, PrizeTable, select};

/// Seeded when `seed` is given, otherwise pulled from OS entropy.
pub fn rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::rng;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = rng(Some(7));
        let mut b = rng(Some(7));

        let left: Vec<u32> = (0..16).map(|_| a.r#gen()).collect();
        let right: Vec<u32> = (0..16).map(|_| b.r#gen()).collect();

        assert_eq!(left, right);
    }
}
