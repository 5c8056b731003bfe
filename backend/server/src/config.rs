use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use prizes::PrizeTable;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::live::Overflow;

const DEFAULT_SLOT_SYMBOLS: &str = "cherry:30,lemon:25,bell:20,star:15,diamond:7,seven:3";
const DEFAULT_WHEEL_PRIZES: &str =
    "sticker:35,drink ticket:25,poster:15,t-shirt:15,hoodie:7,grand prize:3";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: String, reason: String },
}

pub struct Config {
    pub port: u16,
    /// Unset means dev mode, everything lives in `data_path`.
    pub redis_url: Option<String>,
    pub data_path: PathBuf,
    pub store_timeout: Duration,
    pub slot_reels: usize,
    pub align_probability: f64,
    pub strip_length: usize,
    /// Spins per player per game until an admin reset, 0 for unlimited.
    pub spin_limit: u32,
    pub slot_symbols: PrizeTable,
    pub wheel_prizes: PrizeTable,
    pub live_buffer: usize,
    pub live_overflow: Overflow,
    pub rng_seed: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            env::var(key)
                .map_err(|_| {
                    debug!("Environment variable {key} not found");
                })
                .ok()
        })
    }

    /// Same as [`Config::load`] but reads from a fixed set of pairs.
    pub fn from_vars<'a>(
        vars: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigError> {
        let vars: Vec<(&str, &str)> = vars.into_iter().collect();

        Self::from_lookup(|key| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        })
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            port: try_load(&lookup, "RUST_PORT", "1111")?,
            redis_url: lookup("REDIS_URL").or_else(|| read_secret("REDIS_URL")),
            data_path: try_load(&lookup, "DATA_PATH", "snapbooth.json")?,
            store_timeout: Duration::from_millis(try_load(&lookup, "STORE_TIMEOUT_MS", "500")?),
            slot_reels: try_load(&lookup, "SLOT_REELS", "3")?,
            align_probability: try_load(&lookup, "ALIGN_PROBABILITY", "0.28")?,
            strip_length: try_load(&lookup, "STRIP_LENGTH", "24")?,
            spin_limit: try_load(&lookup, "SPIN_LIMIT", "3")?,
            slot_symbols: try_load(&lookup, "SLOT_SYMBOLS", DEFAULT_SLOT_SYMBOLS)?,
            wheel_prizes: try_load(&lookup, "WHEEL_PRIZES", DEFAULT_WHEEL_PRIZES)?,
            live_buffer: try_load(&lookup, "LIVE_BUFFER", "32")?,
            live_overflow: try_load(&lookup, "LIVE_OVERFLOW", "drop")?,
            rng_seed: lookup("RNG_SEED")
                .map(|seed| parse("RNG_SEED", &seed))
                .transpose()?,
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_reels == 0 {
            return Err(invalid("SLOT_REELS", "need at least one reel"));
        }

        if !(0.0..=1.0).contains(&self.align_probability) {
            return Err(invalid("ALIGN_PROBABILITY", "must be within [0, 1]"));
        }

        if self.strip_length > 1 && self.slot_symbols.distinct_positive() < 2 {
            return Err(invalid(
                "SLOT_SYMBOLS",
                "strips need two symbols with positive weight",
            ));
        }

        if self.live_buffer == 0 {
            return Err(invalid("LIVE_BUFFER", "must be positive"));
        }

        if self.store_timeout.is_zero() {
            return Err(invalid("STORE_TIMEOUT_MS", "must be positive"));
        }

        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    warn!("Invalid {key} value: {reason}");

    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse(key, &value)
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| invalid(key, &e.to_string()))
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            debug!("No {secret_name} secret: {e}");
        })
        .ok()
        .filter(|secret| !secret.is_empty())
}
