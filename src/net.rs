use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, trace};

use crate::model::{FlightRecord, HistoryFeed, LiveFeed, ServerStatus};

/// Why a request failed. The board collapses every variant into one
/// message; the variant is only logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("client error: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("not found")]
    NotFound,
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Read-only access to the flight API.
pub trait FlightSource: Send + Sync {
    fn live(&self) -> Result<LiveFeed, FetchError>;
    fn history(&self) -> Result<HistoryFeed, FetchError>;
    fn flight(&self, id: &str) -> Result<FlightRecord, FetchError>;
    fn status(&self) -> Result<ServerStatus, FetchError>;
}

pub struct HttpSource {
    client: Client,
    base: String,
}

impl HttpSource {
    /// A zero `timeout` leaves requests unbounded.
    pub fn new(base_url: &str, timeout: Duration, insecure: bool) -> Result<Self, FetchError> {
        let timeout = if timeout.is_zero() { None } else { Some(timeout) };
        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;
        Ok(Self {
            client,
            base: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base, path);
        trace!("GET {url}");
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp
            .text()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        let parsed = serde_json::from_str(&body).map_err(|err| FetchError::Decode(err.to_string()))?;
        debug!("GET {url} ok ({} bytes)", body.len());
        Ok(parsed)
    }
}

impl FlightSource for HttpSource {
    fn live(&self) -> Result<LiveFeed, FetchError> {
        self.get_json("/flights")
    }

    fn history(&self) -> Result<HistoryFeed, FetchError> {
        self.get_json("/flights/history")
    }

    fn flight(&self, id: &str) -> Result<FlightRecord, FetchError> {
        let id = id.trim();
        if id.is_empty() || id.contains('/') {
            return Err(FetchError::NotFound);
        }
        self.get_json(&format!("/flights/{id}"))
    }

    fn status(&self) -> Result<ServerStatus, FetchError> {
        self.get_json("/status")
    }
}
