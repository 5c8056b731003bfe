use std::sync::LazyLock;

use axum::body::Bytes;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::AppError::{self, MalformedPayload};

pub const MAX_NAME_CHARS: usize = 80;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:-]{1,128}$").expect("id pattern compiles"));
static CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Cc}").expect("control pattern compiles"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("space pattern compiles"));

pub fn parse_payload<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(bytes).map_err(|e| MalformedPayload(e.to_string()))
}

/// Media ids come from storage providers, player and item ids from the
/// frontend. All of them end up inside store keys.
pub fn checked_id<'a>(field: &str, input: &'a str) -> Result<&'a str, AppError> {
    if ID_PATTERN.is_match(input) {
        Ok(input)
    } else {
        Err(MalformedPayload(format!("{field} must be 1-128 of [A-Za-z0-9_.:-]")))
    }
}

pub fn sanitize_name(input: &str) -> String {
    let s = SPACES.replace_all(input, " ");
    let s = CONTROL.replace_all(&s, "");

    s.trim().to_string()
}

pub fn checked_name(input: &str) -> Result<String, AppError> {
    let name = sanitize_name(input);

    match name.chars().count() {
        0 => Err(MalformedPayload("displayName is empty".into())),
        n if n > MAX_NAME_CHARS => Err(MalformedPayload(format!(
            "displayName longer than {MAX_NAME_CHARS} characters"
        ))),
        _ => Ok(name),
    }
}
