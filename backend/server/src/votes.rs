//! # Votes
//!
//! Counting lives in the store, broadcasting in the [`LiveHub`]. An increment
//! is published only after the store confirmed it, with the count the store
//! returned, so subscribers never see a vote that did not land. The hub
//! epoch is read before the store call so a reset in between cannot let an
//! old count through.
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{
    database::{Store, StoreError},
    live::LiveHub,
};

pub async fn increment(store: &Store, live: &LiveHub, item_id: &str) -> Result<u64, StoreError> {
    let epoch = live.epoch();
    let count = store.incr_votes(item_id).await.inspect_err(|e| {
        warn!(item_id, "Vote not counted: {e}");
    })?;

    let delivery = live.publish(epoch, item_id, count);
    debug!(
        item_id,
        count,
        delivered = delivery.delivered,
        dropped = delivery.dropped,
        disconnected = delivery.disconnected,
        stale = delivery.stale,
        "Vote published"
    );

    Ok(count)
}

pub async fn count(store: &Store, item_id: &str) -> Result<u64, StoreError> {
    store.votes(item_id).await
}

pub async fn counts(store: &Store) -> Result<HashMap<String, u64>, StoreError> {
    store.all_votes().await
}

pub async fn reset(store: &Store, live: &LiveHub) -> Result<(), StoreError> {
    store.reset_votes().await?;
    live.reset();

    Ok(())
}
