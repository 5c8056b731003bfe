//! # Raffle
//!
//! Every uploaded entry holds one or more tickets. Only entries whose media
//! still exists in storage take part, anything the admin deleted from the
//! bucket drops out of the draw without touching the entry record.
//!
//! Tickets are never materialised. The draw picks a ticket index over the
//! whole pool and walks the entries, summing ticket counts, until it reaches
//! the owner.
use std::{collections::HashSet, num::NonZeroU32};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawError {
    #[error("No eligible entries")]
    NoEligibleEntries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub display_name: String,
    pub backing_media_id: String,
    #[serde(default = "one_ticket")]
    pub ticket_count: NonZeroU32,
    pub created_at: DateTime<Utc>,
}

fn one_ticket() -> NonZeroU32 {
    NonZeroU32::MIN
}

impl Entry {
    pub fn new(
        display_name: impl Into<String>,
        backing_media_id: impl Into<String>,
        ticket_count: NonZeroU32,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            backing_media_id: backing_media_id.into(),
            ticket_count,
            created_at: Utc::now(),
        }
    }
}

pub fn pick_winner<'a, R: Rng + ?Sized>(
    entries: &'a [Entry],
    eligible_media_ids: &HashSet<String>,
    rng: &mut R,
) -> Result<&'a Entry, DrawError> {
    let eligible: Vec<&Entry> = entries
        .iter()
        .filter(|entry| eligible_media_ids.contains(&entry.backing_media_id))
        .collect();

    let total_tickets: u64 = eligible
        .iter()
        .map(|entry| u64::from(entry.ticket_count.get()))
        .sum();

    if total_tickets == 0 {
        return Err(DrawError::NoEligibleEntries);
    }

    let winning_ticket = rng.gen_range(0..total_tickets);
    let mut cumulative_tickets = 0;

    for entry in eligible {
        cumulative_tickets += u64::from(entry.ticket_count.get());

        if winning_ticket < cumulative_tickets {
            return Ok(entry);
        }
    }

    Err(DrawError::NoEligibleEntries)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn entry(name: &str, media: &str, tickets: u32) -> Entry {
        Entry::new(name, media, NonZeroU32::new(tickets).unwrap())
    }

    fn media(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn tickets_weight_the_draw() {
        let entries = vec![entry("A", "m-a", 3), entry("B", "m-b", 1)];
        let present = media(&["m-a", "m-b"]);
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let trials = 40_000;

        let a_wins = (0..trials)
            .filter(|_| pick_winner(&entries, &present, &mut rng).unwrap().display_name == "A")
            .count();

        let ratio = a_wins as f64 / trials as f64;
        assert!((ratio - 0.75).abs() < 0.015, "A won {ratio}");
    }

    #[test]
    fn deleted_media_never_wins() {
        let entries = vec![entry("A", "m-a", 1), entry("B", "m-b", 50)];
        let present = media(&["m-a"]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        for _ in 0..1_000 {
            assert_eq!(
                pick_winner(&entries, &present, &mut rng).unwrap().display_name,
                "A"
            );
        }
    }

    #[test]
    fn empty_pools() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        assert_eq!(
            pick_winner(&[], &media(&["m-a"]), &mut rng),
            Err(DrawError::NoEligibleEntries)
        );
        assert_eq!(
            pick_winner(&[entry("A", "m-a", 2)], &media(&["m-z"]), &mut rng),
            Err(DrawError::NoEligibleEntries)
        );
    }

    #[test]
    fn missing_ticket_count_defaults_to_one() {
        let entry: Entry = serde_json::from_str(
            r#"{"displayName":"A","backingMediaId":"m-a","createdAt":"2025-11-14T18:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(entry.ticket_count.get(), 1);
    }

    #[test]
    fn zero_tickets_rejected() {
        let parsed = serde_json::from_str::<Entry>(
            r#"{"displayName":"A","backingMediaId":"m-a","ticketCount":0,"createdAt":"2025-11-14T18:00:00Z"}"#,
        );

        assert!(parsed.is_err());
    }
}
