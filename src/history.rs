use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use tracing::{debug, error, warn};

use crate::app::FeedMessage;
use crate::model::{count_mismatch, FlightRecord, HistoryFeed};
use crate::net::{FetchError, FlightSource};

#[derive(Debug)]
pub struct HistoryUpdate {
    pub epoch: u64,
    pub result: Result<HistoryFeed, FetchError>,
}

#[derive(Debug)]
pub struct HistoryBoard {
    pub(crate) flights: Vec<FlightRecord>,
    pub(crate) error: Option<String>,
    pub(crate) loading: bool,
    pub(crate) last_success: Option<SystemTime>,
    error_message: String,
}

impl HistoryBoard {
    pub fn new(error_message: String) -> Self {
        Self {
            flights: Vec::new(),
            error: None,
            loading: false,
            last_success: None,
            error_message,
        }
    }

    pub fn apply(&mut self, result: Result<HistoryFeed, FetchError>) {
        self.loading = false;
        match result {
            Ok(feed) => {
                debug!("history response: {} flights", feed.flights.len());
                if let Some(count) = count_mismatch(feed.count, feed.flights.len()) {
                    warn!("history response claims {count} flights, got {}", feed.flights.len());
                }
                self.flights = feed.flights;
                self.error = None;
                self.last_success = Some(SystemTime::now());
            }
            Err(err) => {
                warn!("history fetch failed: {err}");
                self.flights.clear();
                self.error = Some(self.error_message.clone());
            }
        }
    }

    pub fn flights(&self) -> &[FlightRecord] {
        &self.flights
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn summary(&self) -> String {
        format!("{} flights in last 24h", self.flights.len())
    }
}

/// One request per activation, no timer.
pub struct HistoryController {
    pub(crate) board: HistoryBoard,
    source: Arc<dyn FlightSource>,
    tx: Sender<FeedMessage>,
    epoch: u64,
    active: bool,
}

impl HistoryController {
    pub fn new(source: Arc<dyn FlightSource>, tx: Sender<FeedMessage>, board: HistoryBoard) -> Self {
        Self {
            board,
            source,
            tx,
            epoch: 0,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.epoch += 1;
        self.active = true;
        self.board.loading = true;
        let epoch = self.epoch;
        let source = self.source.clone();
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("history-fetch".to_string())
            .spawn(move || {
                let result = source.history();
                if tx
                    .send(FeedMessage::History(HistoryUpdate { epoch, result }))
                    .is_err()
                {
                    debug!("receiver dropped, discarding history response");
                }
            });
        match spawned {
            Ok(_) => debug!("history board activated (epoch {epoch})"),
            Err(err) => {
                error!("failed to spawn history fetch: {err}");
                self.board.apply(Err(FetchError::Client(err.to_string())));
            }
        }
    }

    pub fn deactivate(&mut self) {
        if self.active {
            debug!("history board deactivated (epoch {})", self.epoch);
        }
        self.active = false;
        self.board.loading = false;
    }

    pub fn handle(&mut self, update: HistoryUpdate) -> bool {
        if !self.active || update.epoch != self.epoch {
            debug!(
                "ignoring history response from epoch {} (current {})",
                update.epoch, self.epoch
            );
            return false;
        }
        self.board.apply(update.result);
        true
    }
}
