//! # Payloads
//!
//! Request bodies are decoded into these structs and checked before any
//! handler logic runs. Unknown fields are rejected so frontend typos surface
//! as `400` instead of being silently ignored.
use std::{collections::HashSet, num::NonZeroU32};

use chrono::{DateTime, Utc};
use prizes::Entry;
use serde::{Deserialize, Serialize};

use crate::{
    database::WinnerRecord,
    error::AppError::{self, MalformedPayload},
    live::Topics,
    utils::{checked_id, checked_name},
};

pub const MAX_TICKETS: u32 = 100;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewEntry {
    pub display_name: String,
    pub media_id: String,
    pub tickets: Option<u32>,
}

impl NewEntry {
    pub fn into_entry(self) -> Result<Entry, AppError> {
        let display_name = checked_name(&self.display_name)?;
        let media_id = checked_id("mediaId", &self.media_id)?;

        let tickets = match self.tickets {
            None => NonZeroU32::MIN,
            Some(n) if n > MAX_TICKETS => {
                return Err(MalformedPayload(format!("tickets above {MAX_TICKETS}")));
            }
            Some(n) => {
                NonZeroU32::new(n).ok_or_else(|| MalformedPayload("tickets must be at least 1".into()))?
            }
        };

        Ok(Entry::new(display_name, media_id, tickets))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpinRequest {
    pub player: String,
}

impl SpinRequest {
    pub fn player(&self) -> Result<&str, AppError> {
        checked_id("player", &self.player)
    }
}

#[derive(Deserialize)]
pub struct LiveQuery {
    /// Comma separated item ids, all items when absent.
    pub ids: Option<String>,
}

impl LiveQuery {
    pub fn topics(&self) -> Result<Topics, AppError> {
        let Some(ids) = self.ids.as_deref().filter(|ids| !ids.trim().is_empty()) else {
            return Ok(Topics::All);
        };

        let topics = ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| checked_id("ids", id).map(str::to_string))
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(Topics::Only(topics))
    }
}

#[derive(Serialize)]
pub struct VoteCount {
    pub id: String,
    pub count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub display_name: String,
    pub media_id: String,
    pub ticket_count: u32,
    pub created_at: DateTime<Utc>,
    pub votes: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSpin {
    pub labels: Vec<String>,
    pub is_win: bool,
    /// One strip per reel, each ending on that reel's label.
    pub strips: Vec<Vec<String>>,
    pub spins_left: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelSpin {
    pub prize: String,
    /// Index of the wedge the wheel stops on.
    pub wedge: usize,
    pub spins_left: Option<u32>,
}

#[derive(Serialize)]
pub struct WinnerResponse {
    pub winner: Option<WinnerRecord>,
}

#[derive(Serialize)]
pub struct MediaRemoved {
    pub id: String,
    pub removed: bool,
}
