use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::app::FeedMessage;
use crate::model::{FlightRecord, ServerStatus};
use crate::net::{FetchError, FlightSource};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupRequest {
    Flight(String),
    Status,
}

#[derive(Debug)]
pub enum LookupMessage {
    Flight(FlightRecord),
    Status(ServerStatus),
    Error {
        request: LookupRequest,
        error: FetchError,
    },
}

/// Serves detail and status requests one at a time until the request
/// side hangs up.
pub fn spawn_lookup_worker(
    source: Arc<dyn FlightSource>,
    rx: Receiver<LookupRequest>,
    tx: Sender<FeedMessage>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("lookup".to_string())
        .spawn(move || {
            info!("lookup worker started");
            while let Ok(request) = rx.recv() {
                debug!("lookup request {request:?}");
                let result = match &request {
                    LookupRequest::Flight(id) => source.flight(id).map(LookupMessage::Flight),
                    LookupRequest::Status => source.status().map(LookupMessage::Status),
                };
                let message = match result {
                    Ok(message) => message,
                    Err(error) => {
                        warn!("lookup {request:?} failed: {error}");
                        LookupMessage::Error { request, error }
                    }
                };
                if tx.send(FeedMessage::Lookup(message)).is_err() {
                    debug!("receiver dropped, exiting lookup worker");
                    break;
                }
            }
            info!("lookup worker stopped");
        })
}
