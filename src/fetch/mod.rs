//! Raw byte loading for input files that may live on disk or behind HTTP.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::PathBuf;
use tracing::debug;

/// Where an input file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Url(String),
}

impl Source {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Source::Url(location.to_string())
        } else {
            Source::Path(PathBuf::from(location))
        }
    }

    /// Loads the full contents of the source.
    ///
    /// Returns `Ok(None)` when the source does not exist (missing file or HTTP 404),
    /// so callers can tell "absent" apart from "broken".
    pub async fn load<C: HttpClient>(&self, client: &C) -> Result<Option<Bytes>> {
        match self {
            Source::Path(path) => match tokio::fs::read(path).await {
                Ok(contents) => {
                    debug!(path = %path.display(), bytes = contents.len(), "Read local source");
                    Ok(Some(Bytes::from(contents)))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => {
                    Err(e).with_context(|| format!("failed to read {}", path.display()))
                }
            },
            Source::Url(url) => fetch_bytes(client, url).await,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Url(url) => write!(f, "{url}"),
        }
    }
}

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Option<Bytes>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let resp = resp.error_for_status()?;
    let body = resp.bytes().await?;
    debug!(url, bytes = body.len(), "Fetched remote source");
    Ok(Some(body))
}
