//! Documentation of the snapbooth event backend: photo/video uploads, live
//! voting, a slot machine, a prize wheel and a raffle for one event night.
//!
//!
//!
//! # General Infrastructure
//! - Attendees upload through the frontend, which stores the file with the
//!   storage provider and then registers the entry here (`POST /entries`)
//! - Votes, spins, entries and the media catalogue live in Redis
//! - Without `REDIS_URL` the server runs in dev mode against a local JSON file
//! - Admin routes sit under `/admin`. The reverse proxy in front of the
//!   server guards them, this process does not check credentials
//!
//!
//!
//! # Live Votes
//!
//! **Goal**: every open gallery sees counts move while people vote, without
//! polling.
//!
//! - `GET /live` opens a server-sent event stream, optionally narrowed with
//!   `?ids=a,b` to the items on screen
//! - A vote is counted with an atomic `HINCRBY`, then the new count is pushed
//!   to every stream listening to that item
//! - Streams carry updates only. On (re)connect the page fetches `/votes`
//! - A client that cannot keep up either misses updates or gets disconnected,
//!   depending on `LIVE_OVERFLOW`. Nobody else waits on it
//!
//!
//!
//! # Games
//!
//! ## Slot Machine
//! Three reels by default. With probability `ALIGN_PROBABILITY` the spin is a
//! forced win, otherwise reels draw independently. The response carries the
//! resting labels plus one display strip per reel for the scroll animation.
//!
//! ## Prize Wheel
//! One weighted draw from `WHEEL_PRIZES`, returned with the wedge index.
//!
//! ## Raffle
//! Each entry holds tickets, each ticket is one equal chance. Entries whose
//! media was deleted from storage do not take part.
//!
//!
//!
//! # Setup
//!
//! Run in dev mode.
//! ```sh
//! RUST_LOG=info cargo run -p server
//! ```
//!
//! Run against Redis with reproducible draws.
//! ```sh
//! REDIS_URL=redis://localhost:6379 RNG_SEED=42 cargo run -p server
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{delete, get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod games;
pub mod live;
pub mod local;
pub mod payloads;
pub mod routes;
pub mod state;
pub mod utils;
pub mod votes;

use config::Config;
use error::AppError;
use routes::{
    cast_vote_handler, clear_entries_handler, delete_media_handler, gallery_handler,
    health_handler, live_handler, pick_winner_handler, register_entry_handler,
    reset_spins_handler, reset_votes_handler, spin_handler, votes_handler, vote_count_handler,
    wheel_handler, winner_handler,
};
use state::AppState;

pub async fn start_server() -> Result<(), AppError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load().inspect_err(|e| error!("{e}"))?;

    info!("Initializing state...");
    let state = AppState::new(config).await.inspect_err(|e| error!("{e}"))?;

    info!("Starting server...");
    let app = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    let live = state.live.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            live.close();
        })
        .await?;

    info!("Server shut down");
    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let admin = Router::new()
        .route("/winner", get(winner_handler).post(pick_winner_handler))
        .route("/reset-votes", post(reset_votes_handler))
        .route("/reset-spins", post(reset_spins_handler))
        .route("/entries", delete(clear_entries_handler))
        .route("/media/{id}", delete(delete_media_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/entries", get(gallery_handler).post(register_entry_handler))
        .route("/votes", get(votes_handler))
        .route("/votes/{id}", get(vote_count_handler).post(cast_vote_handler))
        .route("/live", get(live_handler))
        .route("/spin", post(spin_handler))
        .route("/wheel", post(wheel_handler))
        .nest("/admin", admin)
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::database::Store;

    fn test_app(vars: &[(&str, &str)]) -> (Router, Arc<AppState>) {
        let mut all = vec![("RNG_SEED", "1")];
        all.extend_from_slice(vars);

        let state = AppState::with_store(
            Config::from_vars(all).unwrap(),
            Store::memory(Duration::from_millis(200)),
        );

        (app(state.clone()), state)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        };

        app.clone().oneshot(request.unwrap()).await.unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, name: &str, media: &str, tickets: u32) {
        let res = send(
            app,
            Method::POST,
            "/entries",
            Some(json!({ "displayName": name, "mediaId": media, "tickets": tickets })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn health() {
        let (app, _) = test_app(&[]);
        assert_eq!(send(&app, Method::GET, "/health", None).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn votes_count_up() {
        let (app, _) = test_app(&[]);

        let res = send(&app, Method::GET, "/votes/photo-1", None).await;
        assert_eq!(json_body(res).await, json!({ "id": "photo-1", "count": 0 }));

        send(&app, Method::POST, "/votes/photo-1", None).await;
        let res = send(&app, Method::POST, "/votes/photo-1", None).await;
        assert_eq!(json_body(res).await, json!({ "id": "photo-1", "count": 2 }));

        let res = send(&app, Method::GET, "/votes", None).await;
        assert_eq!(json_body(res).await, json!({ "photo-1": 2 }));
    }

    #[tokio::test]
    async fn bad_ids_rejected() {
        let (app, _) = test_app(&[]);

        let res = send(&app, Method::POST, "/votes/bad%20id", None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_entry_rejected() {
        let (app, _) = test_app(&[]);

        let res = send(&app, Method::POST, "/entries", Some(json!({ "displayName": "Ana" }))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = send(
            &app,
            Method::POST,
            "/entries",
            Some(json!({ "displayName": "Ana", "mediaId": "m-1", "tickets": 0 })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn gallery_hides_deleted_media() {
        let (app, _) = test_app(&[]);
        register(&app, "Ana", "m-1", 1).await;
        register(&app, "Ben", "m-2", 2).await;
        send(&app, Method::POST, "/votes/m-2", None).await;

        let res = send(&app, Method::DELETE, "/admin/media/m-1", None).await;
        assert_eq!(json_body(res).await, json!({ "id": "m-1", "removed": true }));

        let gallery = json_body(send(&app, Method::GET, "/entries", None).await).await;
        let items = gallery.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["displayName"], "Ben");
        assert_eq!(items[0]["ticketCount"], 2);
        assert_eq!(items[0]["votes"], 1);
    }

    #[tokio::test]
    async fn winner_flow() {
        let (app, _) = test_app(&[]);

        let res = send(&app, Method::POST, "/admin/winner", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["winner"], Value::Null);

        register(&app, "Ana", "m-1", 1).await;
        register(&app, "Ben", "m-2", 1).await;
        send(&app, Method::DELETE, "/admin/media/m-2", None).await;

        let res = send(&app, Method::POST, "/admin/winner", None).await;
        assert_eq!(json_body(res).await["winner"]["displayName"], "Ana");

        let res = send(&app, Method::GET, "/admin/winner", None).await;
        assert_eq!(json_body(res).await["winner"]["backingMediaId"], "m-1");

        let res = send(&app, Method::DELETE, "/admin/entries", None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = send(&app, Method::POST, "/admin/winner", None).await;
        assert_eq!(json_body(res).await["winner"], Value::Null);
    }

    #[tokio::test]
    async fn spins_limited_until_reset() {
        let (app, _) = test_app(&[("SPIN_LIMIT", "1")]);
        let player = Some(json!({ "player": "ana" }));

        let res = send(&app, Method::POST, "/spin", player.clone()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let spin = json_body(res).await;
        assert_eq!(spin["labels"].as_array().unwrap().len(), 3);
        assert_eq!(spin["spinsLeft"], 0);

        let res = send(&app, Method::POST, "/spin", player.clone()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let res = send(&app, Method::POST, "/admin/reset-spins", None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = send(&app, Method::POST, "/spin", player).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wheel_needs_player() {
        let (app, _) = test_app(&[]);

        let res = send(&app, Method::POST, "/wheel", Some(json!({}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = send(&app, Method::POST, "/wheel", Some(json!({ "player": "ana" }))).await;
        let spin = json_body(res).await;
        assert!(spin["prize"].is_string());
        assert!(spin["wedge"].is_u64());
    }

    #[tokio::test]
    async fn reset_votes_clears_counts() {
        let (app, _) = test_app(&[]);
        send(&app, Method::POST, "/votes/photo-1", None).await;

        let res = send(&app, Method::POST, "/admin/reset-votes", None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = send(&app, Method::GET, "/votes/photo-1", None).await;
        assert_eq!(json_body(res).await["count"], 0);
    }

    #[tokio::test]
    async fn live_stream_pushes_votes() {
        let (app, state) = test_app(&[]);

        let res = send(&app, Method::GET, "/live?ids=photo-1", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(state.live.subscriber_count(), 1);

        send(&app, Method::POST, "/votes/photo-2", None).await;
        send(&app, Method::POST, "/votes/photo-1", None).await;

        let mut body = res.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();

        assert!(text.contains("event: vote"));
        assert!(text.contains(r#""id":"photo-1""#));
        assert!(!text.contains("photo-2"));

        drop(body);
        assert_eq!(state.live.subscriber_count(), 0);
    }
}
