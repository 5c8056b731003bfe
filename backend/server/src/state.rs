use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::{config::Config, database::Store, error::AppError, live::LiveHub};

pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub live: Arc<LiveHub>,
    rng: Mutex<ChaCha8Rng>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>, AppError> {
        let store = Store::connect(
            config.redis_url.as_deref(),
            config.data_path.clone(),
            config.store_timeout,
        )
        .await?;

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Store) -> Arc<Self> {
        if config.rng_seed.is_some() {
            info!("RNG_SEED set, draws are reproducible");
        }

        let live = LiveHub::new(config.live_buffer, config.live_overflow);
        let rng = Mutex::new(prizes::rng(config.rng_seed));

        Arc::new(Self {
            config,
            store,
            live,
            rng,
        })
    }

    /// The single random source for spins, strips and raffle draws. Never
    /// hold the guard across an `.await`.
    pub fn rng(&self) -> MutexGuard<'_, ChaCha8Rng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
