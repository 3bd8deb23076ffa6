use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Mutex;
use std::time::Duration;

use crate::app::FeedMessage;
use crate::history::HistoryUpdate;
use crate::live::LiveUpdate;
use crate::lookup::LookupMessage;
use crate::model::{FlightRecord, HistoryFeed, LiveFeed, ServerStatus};
use crate::net::{FetchError, FlightSource};

/// Scripted transport. Each queue is drained in order; an empty queue
/// answers with an empty feed.
#[derive(Default)]
pub struct FakeSource {
    live: Mutex<VecDeque<Result<LiveFeed, FetchError>>>,
    history: Mutex<VecDeque<Result<HistoryFeed, FetchError>>>,
    flights: Mutex<Vec<FlightRecord>>,
    status: Mutex<Option<Result<ServerStatus, FetchError>>>,
    live_calls: AtomicUsize,
    history_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl FakeSource {
    pub fn push_live(&self, result: Result<LiveFeed, FetchError>) {
        self.live.lock().unwrap().push_back(result);
    }

    pub fn push_history(&self, result: Result<HistoryFeed, FetchError>) {
        self.history.lock().unwrap().push_back(result);
    }

    pub fn add_flight(&self, record: FlightRecord) {
        self.flights.lock().unwrap().push(record);
    }

    pub fn set_status(&self, result: Result<ServerStatus, FetchError>) {
        *self.status.lock().unwrap() = Some(result);
    }

    pub fn live_calls(&self) -> usize {
        self.live_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

impl FlightSource for FakeSource {
    fn live(&self) -> Result<LiveFeed, FetchError> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        self.live
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(LiveFeed::default()))
    }

    fn history(&self) -> Result<HistoryFeed, FetchError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HistoryFeed::default()))
    }

    fn flight(&self, id: &str) -> Result<FlightRecord, FetchError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.flights
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or(FetchError::NotFound)
    }

    fn status(&self) -> Result<ServerStatus, FetchError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.status
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(FetchError::Transport("unreachable".to_string())))
    }
}

pub fn flight(id: &str) -> FlightRecord {
    FlightRecord {
        id: id.to_string(),
        callsign: id.to_ascii_uppercase(),
        ..Default::default()
    }
}

pub fn feed(flights: Vec<FlightRecord>, updated_at: Option<&str>) -> LiveFeed {
    LiveFeed {
        count: Some(flights.len() as u64),
        flights,
        updated_at: updated_at.map(str::to_string),
    }
}

pub fn history_feed(flights: Vec<FlightRecord>) -> HistoryFeed {
    HistoryFeed {
        count: Some(flights.len() as u64),
        flights,
    }
}

const WAIT: Duration = Duration::from_secs(2);

pub fn recv_live(rx: &Receiver<FeedMessage>) -> LiveUpdate {
    loop {
        match rx.recv_timeout(WAIT).expect("no live update") {
            FeedMessage::Live(update) => return update,
            _ => continue,
        }
    }
}

pub fn recv_history(rx: &Receiver<FeedMessage>) -> HistoryUpdate {
    loop {
        match rx.recv_timeout(WAIT).expect("no history update") {
            FeedMessage::History(update) => return update,
            _ => continue,
        }
    }
}

pub fn recv_lookup(rx: &Receiver<FeedMessage>) -> LookupMessage {
    loop {
        match rx.recv_timeout(WAIT).expect("no lookup reply") {
            FeedMessage::Lookup(message) => return message,
            _ => continue,
        }
    }
}
