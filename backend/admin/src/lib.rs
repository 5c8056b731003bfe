//! # Snapbooth Admin
//!
//! Command line client for the `/admin` routes, for the person running the
//! event from a laptop. Requests go straight to the server, so point
//! `--server` at an address that is allowed past the proxy.
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use reqwest::{Client, Method, Response};
use serde_json::Value;

pub const DEFAULT_SERVER: &str = "http://localhost:1111";

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Draw a raffle winner and record it
    PickWinner,

    /// Show the recorded winner
    Winner,

    /// Show all vote counts
    Votes,

    /// Zero every vote count
    ResetVotes,

    /// Give every player their spins back
    ResetSpins,

    /// Drop all raffle entries
    ClearEntries,

    /// Mark media as deleted from storage
    DeleteMedia { id: String },
}

impl Command {
    fn route(&self) -> (Method, String) {
        match self {
            Command::PickWinner => (Method::POST, "/admin/winner".into()),
            Command::Winner => (Method::GET, "/admin/winner".into()),
            Command::Votes => (Method::GET, "/votes".into()),
            Command::ResetVotes => (Method::POST, "/admin/reset-votes".into()),
            Command::ResetSpins => (Method::POST, "/admin/reset-spins".into()),
            Command::ClearEntries => (Method::DELETE, "/admin/entries".into()),
            Command::DeleteMedia { id } => (Method::DELETE, format!("/admin/media/{id}")),
        }
    }
}

pub fn endpoint(server: &str, path: &str) -> String {
    format!("{}{path}", server.trim_end_matches('/'))
}

pub async fn run(server: &str, command: &Command) -> Result<()> {
    let (method, path) = command.route();
    let url = endpoint(server, &path);

    let res = Client::new()
        .request(method.clone(), &url)
        .send()
        .await
        .with_context(|| format!("{method} {url} failed"))?;

    report(res).await
}

async fn report(res: Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await.context("Failed to read response")?;

    if !status.is_success() {
        bail!("Server answered {status}: {body}");
    }

    if body.is_empty() {
        println!("Done ({status})");
        return Ok(());
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }

    Ok(())
}
