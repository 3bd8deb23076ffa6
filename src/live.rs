use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, warn};

use crate::app::FeedMessage;
use crate::model::{count_mismatch, FlightRecord, LiveFeed};
use crate::net::{FetchError, FlightSource};
use crate::poller::ScheduledTask;
use crate::rows::{local_clock, parse_timestamp, DASH};

/// Ticks are skipped while this many fetches are still waiting on the server.
pub const MAX_IN_FLIGHT: usize = 4;

#[derive(Debug)]
pub struct LiveUpdate {
    pub epoch: u64,
    pub seq: u64,
    pub result: Result<LiveFeed, FetchError>,
}

/// What the live board shows. Replaced wholesale on every good response.
#[derive(Debug)]
pub struct LiveBoard {
    pub(crate) flights: Vec<FlightRecord>,
    pub(crate) updated_at: Option<DateTime<FixedOffset>>,
    pub(crate) error: Option<String>,
    pub(crate) last_success: Option<SystemTime>,
    last_applied: Option<u64>,
    sequence_guard: bool,
    error_message: String,
}

impl LiveBoard {
    pub fn new(error_message: String, sequence_guard: bool) -> Self {
        Self {
            flights: Vec::new(),
            updated_at: None,
            error: None,
            last_success: None,
            last_applied: None,
            sequence_guard,
            error_message,
        }
    }

    /// Returns false when the response was dropped as out of date.
    pub fn apply(&mut self, seq: u64, result: Result<LiveFeed, FetchError>) -> bool {
        if self.sequence_guard && self.last_applied.is_some_and(|last| seq < last) {
            debug!("live response #{seq} dropped, #{:?} already applied", self.last_applied);
            return false;
        }
        self.last_applied = Some(self.last_applied.map_or(seq, |last| last.max(seq)));

        match result {
            Ok(feed) => {
                debug!("live response #{seq}: {} flights", feed.flights.len());
                if let Some(count) = count_mismatch(feed.count, feed.flights.len()) {
                    warn!("live response #{seq} claims {count} flights, got {}", feed.flights.len());
                }
                self.updated_at = feed.updated_at.as_deref().and_then(parse_timestamp);
                self.flights = feed.flights;
                self.error = None;
                self.last_success = Some(SystemTime::now());
            }
            Err(err) => {
                warn!("live fetch #{seq} failed: {err}");
                self.error = Some(self.error_message.clone());
            }
        }
        true
    }

    pub fn flights(&self) -> &[FlightRecord] {
        &self.flights
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True until the first response of any kind has been applied.
    pub fn pending(&self) -> bool {
        self.last_success.is_none() && self.error.is_none()
    }

    pub fn header_time(&self) -> String {
        self.updated_at
            .as_ref()
            .map(local_clock)
            .unwrap_or_else(|| DASH.to_string())
    }
}

/// Drives the live board: an immediate fetch on activation, then one per
/// interval until deactivated.
pub struct LiveController {
    pub(crate) board: LiveBoard,
    source: Arc<dyn FlightSource>,
    tx: Sender<FeedMessage>,
    interval: Duration,
    epoch: u64,
    seq: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
    task: Option<ScheduledTask>,
}

impl LiveController {
    pub fn new(
        source: Arc<dyn FlightSource>,
        tx: Sender<FeedMessage>,
        interval: Duration,
        board: LiveBoard,
    ) -> Self {
        Self {
            board,
            source,
            tx,
            interval,
            epoch: 0,
            seq: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            task: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(ScheduledTask::is_active)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn activate(&mut self) {
        if self.is_active() {
            return;
        }
        self.epoch += 1;
        let epoch = self.epoch;
        let source = self.source.clone();
        let tx = self.tx.clone();
        let seq = self.seq.clone();
        let in_flight = self.in_flight.clone();

        let tick = move || {
            let pending = in_flight.load(Ordering::SeqCst);
            if pending >= MAX_IN_FLIGHT {
                warn!("{pending} live requests still unanswered, skipping tick");
                return;
            }
            let seq = seq.fetch_add(1, Ordering::SeqCst) + 1;
            let source = source.clone();
            let tx = tx.clone();
            let counter = in_flight.clone();
            counter.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name("live-fetch".to_string())
                .spawn(move || {
                    let result = source.live();
                    counter.fetch_sub(1, Ordering::SeqCst);
                    let update = LiveUpdate { epoch, seq, result };
                    if tx.send(FeedMessage::Live(update)).is_err() {
                        debug!("receiver dropped, discarding live response #{seq}");
                    }
                });
            if let Err(err) = spawned {
                in_flight.fetch_sub(1, Ordering::SeqCst);
                error!("failed to spawn live fetch: {err}");
            }
        };

        match ScheduledTask::spawn("live-poller", self.interval, tick) {
            Ok(task) => {
                debug!("live board activated (epoch {epoch})");
                self.task = Some(task);
            }
            Err(err) => {
                error!("failed to start live poller: {err}");
                self.board.error = Some(self.board.error_message.clone());
            }
        }
    }

    pub fn deactivate(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.cancel();
            debug!("live board deactivated (epoch {})", self.epoch);
        }
    }

    /// Stops the timer and waits for its thread. Fetches already on the
    /// wire are left to finish on their own.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.shutdown();
            debug!("live board shut down (epoch {})", self.epoch);
        }
    }

    /// Restarts the cycle so the next fetch happens now.
    pub fn reload(&mut self) {
        self.deactivate();
        self.activate();
    }

    pub fn handle(&mut self, update: LiveUpdate) -> bool {
        if !self.is_active() || update.epoch != self.epoch {
            debug!(
                "ignoring live response #{} from epoch {} (current {})",
                update.seq, update.epoch, self.epoch
            );
            return false;
        }
        self.board.apply(update.seq, update.result)
    }
}

impl Drop for LiveController {
    fn drop(&mut self) {
        self.deactivate();
    }
}
