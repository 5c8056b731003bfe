//! # Games
//!
//! Slot machine, prize wheel and the raffle draw, wired to the store.
//!
//! ## Spin Limits
//! Every player gets `SPIN_LIMIT` spins per game. The counter is bumped
//! before the spin and checked after, so two racing requests cannot both use
//! the last spin. Admins clear all counters with `/admin/reset-spins`.
use prizes::{display_strip, pick_winner, spin};
use tracing::info;

use crate::{
    database::WinnerRecord,
    error::AppError,
    payloads::{SlotSpin, WheelSpin},
    state::AppState,
};

const SLOTS: &str = "slots";
const WHEEL: &str = "wheel";

/// Returns the spins left after this one, `None` when unlimited.
async fn take_spin(state: &AppState, game: &str, player: &str) -> Result<Option<u32>, AppError> {
    let limit = state.config.spin_limit;
    let used = state.store.incr_spins(&format!("{game}:{player}")).await?;

    if limit == 0 {
        return Ok(None);
    }

    if used > limit {
        info!(player, game, "Spin limit reached");
        return Err(AppError::SpinLimitReached(limit));
    }

    Ok(Some(limit - used))
}

pub async fn spin_slots(state: &AppState, player: &str) -> Result<SlotSpin, AppError> {
    let spins_left = take_spin(state, SLOTS, player).await?;
    let config = &state.config;

    let (result, strips) = {
        let mut rng = state.rng();

        let result = spin(
            &config.slot_symbols,
            config.slot_reels,
            config.align_probability,
            &mut *rng,
        )?;

        let strips = result
            .labels()
            .iter()
            .map(|label| {
                display_strip(
                    &config.slot_symbols,
                    config.strip_length,
                    Some(label.as_str()),
                    &mut *rng,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        (result, strips)
    };

    let is_win = result.is_win();
    info!(player, is_win, forced = result.forced(), "Slot spin");

    Ok(SlotSpin {
        labels: result.into_labels(),
        is_win,
        strips,
        spins_left,
    })
}

pub async fn spin_wheel(state: &AppState, player: &str) -> Result<WheelSpin, AppError> {
    let spins_left = take_spin(state, WHEEL, player).await?;
    let table = &state.config.wheel_prizes;

    let prize = table.select(&mut *state.rng()).to_string();
    let wedge = table
        .outcomes()
        .iter()
        .position(|outcome| outcome.label == prize)
        .unwrap_or_default();

    info!(player, %prize, "Wheel spin");

    Ok(WheelSpin {
        prize,
        wedge,
        spins_left,
    })
}

/// Draws among entries whose media is still in storage and records the
/// result as the current winner.
pub async fn draw_winner(state: &AppState) -> Result<WinnerRecord, AppError> {
    let entries = state.store.entries().await?;
    let eligible_media_ids = state.store.media_ids().await?;

    let record = {
        let mut rng = state.rng();
        WinnerRecord::from(pick_winner(&entries, &eligible_media_ids, &mut *rng)?)
    };

    state.store.set_winner(&record).await?;
    info!(
        winner = %record.display_name,
        media = %record.backing_media_id,
        entries = entries.len(),
        "Winner picked"
    );

    Ok(record)
}
