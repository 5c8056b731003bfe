use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, stream};
use tracing::{debug, info};

use crate::{
    error::AppError,
    games,
    payloads::{
        GalleryItem, LiveQuery, MediaRemoved, NewEntry, SpinRequest, VoteCount, WinnerResponse,
    },
    state::AppState,
    utils::{checked_id, parse_payload},
    votes,
};

type AppResult<T> = Result<T, AppError>;

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn register_entry_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let entry = parse_payload::<NewEntry>(&body)?.into_entry()?;

    state.store.add_media(&entry.backing_media_id).await?;
    state.store.push_entry(&entry).await?;

    info!(
        name = %entry.display_name,
        media = %entry.backing_media_id,
        tickets = entry.ticket_count.get(),
        "Entry registered"
    );

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Newest first, only entries whose media still exists.
pub async fn gallery_handler(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<GalleryItem>>> {
    let entries = state.store.entries().await?;
    let media = state.store.media_ids().await?;
    let counts = votes::counts(&state.store).await?;

    let gallery = entries
        .into_iter()
        .rev()
        .filter(|entry| media.contains(&entry.backing_media_id))
        .map(|entry| GalleryItem {
            votes: counts.get(&entry.backing_media_id).copied().unwrap_or(0),
            ticket_count: entry.ticket_count.get(),
            created_at: entry.created_at,
            display_name: entry.display_name,
            media_id: entry.backing_media_id,
        })
        .collect();

    Ok(Json(gallery))
}

pub async fn votes_handler(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<HashMap<String, u64>>> {
    Ok(Json(votes::counts(&state.store).await?))
}

pub async fn vote_count_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<VoteCount>> {
    let id = checked_id("id", &id)?;
    let count = votes::count(&state.store, id).await?;

    Ok(Json(VoteCount {
        id: id.to_string(),
        count,
    }))
}

pub async fn cast_vote_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<VoteCount>> {
    let id = checked_id("id", &id)?;
    let count = votes::increment(&state.store, &state.live, id).await?;

    Ok(Json(VoteCount {
        id: id.to_string(),
        count,
    }))
}

pub async fn live_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LiveQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let subscription = state.live.subscribe(query.topics()?);
    debug!(subscribers = state.live.subscriber_count(), "Live stream opened");

    let events = stream::unfold(subscription, |mut subscription| async move {
        let update = subscription.recv().await?;
        let event = Event::default()
            .event("vote")
            .id(update.count.to_string())
            .json_data(&update);

        Some((event, subscription))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn spin_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let request = parse_payload::<SpinRequest>(&body)?;

    Ok(Json(games::spin_slots(&state, request.player()?).await?))
}

pub async fn wheel_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let request = parse_payload::<SpinRequest>(&body)?;

    Ok(Json(games::spin_wheel(&state, request.player()?).await?))
}

pub async fn pick_winner_handler(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<WinnerResponse>> {
    let record = games::draw_winner(&state).await?;

    Ok(Json(WinnerResponse {
        winner: Some(record),
    }))
}

pub async fn winner_handler(State(state): State<Arc<AppState>>) -> AppResult<Json<WinnerResponse>> {
    Ok(Json(WinnerResponse {
        winner: state.store.winner().await?,
    }))
}

pub async fn reset_votes_handler(State(state): State<Arc<AppState>>) -> AppResult<StatusCode> {
    votes::reset(&state.store, &state.live).await?;
    info!("Votes reset");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_spins_handler(State(state): State<Arc<AppState>>) -> AppResult<StatusCode> {
    state.store.reset_spins().await?;
    info!("Spins reset");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_entries_handler(State(state): State<Arc<AppState>>) -> AppResult<StatusCode> {
    state.store.clear_entries().await?;
    info!("Entries cleared");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_media_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<MediaRemoved>> {
    let id = checked_id("id", &id)?;
    let removed = state.store.remove_media(id).await?;
    info!(media = id, removed, "Media removed from catalogue");

    Ok(Json(MediaRemoved {
        id: id.to_string(),
        removed,
    }))
}
