use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;
use ratatui::layout::Rect;
use ratatui::widgets::TableState;
use tracing::{debug, info, warn};

use crate::config::{self, Config};
use crate::history::{HistoryBoard, HistoryController, HistoryUpdate};
use crate::live::{LiveBoard, LiveController, LiveUpdate};
use crate::lookup::{LookupMessage, LookupRequest};
use crate::model::{FlightRecord, ServerStatus};
use crate::net::{FetchError, FlightSource};
use crate::rows::RowMapper;

pub const NOT_FOUND_MESSAGE: &str = "Flight not found";

/// Everything the worker threads send back to the UI loop.
#[derive(Debug)]
pub enum FeedMessage {
    Live(LiveUpdate),
    History(HistoryUpdate),
    Lookup(LookupMessage),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Live,
    History,
}

impl Route {
    pub const ALL: [Route; 2] = [Route::Live, Route::History];

    pub fn next(self) -> Self {
        match self {
            Route::Live => Route::History,
            Route::History => Route::Live,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Live => "/",
            Route::History => "/history",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Route::Live => "LIVE",
            Route::History => "HISTORY",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "history" | "/history" | "h" | "24h" => Route::History,
            _ => Route::Live,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Help,
    Detail,
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    Default,
    Amber,
    Monochrome,
}

impl ThemeMode {
    pub fn toggle(self) -> Self {
        match self {
            ThemeMode::Default => ThemeMode::Amber,
            ThemeMode::Amber => ThemeMode::Monochrome,
            ThemeMode::Monochrome => ThemeMode::Default,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThemeMode::Default => "DEFAULT",
            ThemeMode::Amber => "AMBER",
            ThemeMode::Monochrome => "MONO",
        }
    }

    pub fn config_value(self) -> &'static str {
        match self {
            ThemeMode::Default => "default",
            ThemeMode::Amber => "amber",
            ThemeMode::Monochrome => "mono",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "amber" | "gold" => ThemeMode::Amber,
            "mono" | "monochrome" | "bw" | "grayscale" => ThemeMode::Monochrome,
            _ => ThemeMode::Default,
        }
    }
}

/// Content of the detail and status popups.
#[derive(Clone, Debug, PartialEq)]
pub enum Panel<T> {
    Loading,
    Ready(T),
    Failed(String),
}

pub struct App {
    pub(crate) route: Route,
    pub(crate) live: LiveController,
    pub(crate) history: HistoryController,
    pub(crate) mapper: RowMapper,
    pub(crate) input_mode: InputMode,
    pub(crate) theme_mode: ThemeMode,
    pub(crate) live_table: TableState,
    pub(crate) history_table: TableState,
    pub(crate) table_area: Option<Rect>,
    pub(crate) detail: Option<Panel<FlightRecord>>,
    detail_id: Option<String>,
    pub(crate) status: Option<Panel<ServerStatus>>,
    pub(crate) title: String,
    pub(crate) site: String,
    pub(crate) source_url: String,
    pub(crate) error_message: String,
    pub(crate) config_path: PathBuf,
    pub(crate) notice: Option<(String, SystemTime)>,
    lookup_tx: Sender<LookupRequest>,
}

impl App {
    pub fn new(
        config: &Config,
        source: Arc<dyn FlightSource>,
        tx: Sender<FeedMessage>,
        lookup_tx: Sender<LookupRequest>,
    ) -> Result<Self> {
        let mapper = RowMapper::new(config.numeric_policy()?, config.timezone()?);
        let live = LiveController::new(
            source.clone(),
            tx.clone(),
            config.refresh,
            LiveBoard::new(config.error_message.clone(), config.sequence_guard),
        );
        let history = HistoryController::new(
            source,
            tx,
            HistoryBoard::new(config.error_message.clone()),
        );
        let mut live_table = TableState::default();
        live_table.select(Some(0));
        let mut history_table = TableState::default();
        history_table.select(Some(0));

        Ok(Self {
            route: Route::from_str(&config.view),
            live,
            history,
            mapper,
            input_mode: InputMode::Normal,
            theme_mode: ThemeMode::from_str(&config.theme),
            live_table,
            history_table,
            table_area: None,
            detail: None,
            detail_id: None,
            status: None,
            title: config.title.clone(),
            site: config.site.clone(),
            source_url: config.url.clone(),
            error_message: config.error_message.clone(),
            config_path: config.config_path.clone(),
            notice: None,
            lookup_tx,
        })
    }

    pub fn start(&mut self) {
        info!(
            "starting on {} (numeric policy {})",
            self.route.path(),
            self.mapper.policy().label()
        );
        self.activate(self.route);
    }

    pub fn shutdown(&mut self) {
        self.live.shutdown();
        self.history.deactivate();
    }

    fn activate(&mut self, route: Route) {
        match route {
            Route::Live => self.live.activate(),
            Route::History => self.history.activate(),
        }
    }

    fn deactivate(&mut self, route: Route) {
        match route {
            Route::Live => self.live.deactivate(),
            Route::History => self.history.deactivate(),
        }
    }

    pub fn switch_to(&mut self, route: Route) {
        if route == self.route {
            return;
        }
        debug!("route {} -> {}", self.route.path(), route.path());
        self.deactivate(self.route);
        self.route = route;
        self.close_popup();
        self.activate(route);
    }

    pub fn next_route(&mut self) {
        self.switch_to(self.route.next());
    }

    pub fn reload(&mut self) {
        debug!("reload {}", self.route.path());
        match self.route {
            Route::Live => self.live.reload(),
            Route::History => self.history.activate(),
        }
    }

    pub fn handle_feed(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Live(update) => {
                let key = selected_id(&self.live_table, self.live.board.flights());
                if self.live.handle(update) {
                    restore_selection(&mut self.live_table, self.live.board.flights(), key);
                }
            }
            FeedMessage::History(update) => {
                let key = selected_id(&self.history_table, self.history.board.flights());
                if self.history.handle(update) {
                    restore_selection(&mut self.history_table, self.history.board.flights(), key);
                }
            }
            FeedMessage::Lookup(message) => self.apply_lookup(message),
        }
    }

    fn apply_lookup(&mut self, message: LookupMessage) {
        match message {
            LookupMessage::Flight(record) => {
                if self.detail_id.as_deref() == Some(record.id.as_str()) {
                    self.detail = Some(Panel::Ready(record));
                }
            }
            LookupMessage::Status(status) => {
                if self.status.is_some() {
                    self.status = Some(Panel::Ready(status));
                }
            }
            LookupMessage::Error { request, error } => match request {
                LookupRequest::Flight(id) => {
                    if self.detail_id.as_deref() == Some(id.as_str()) {
                        let text = if error == FetchError::NotFound {
                            NOT_FOUND_MESSAGE.to_string()
                        } else {
                            self.error_message.clone()
                        };
                        self.detail = Some(Panel::Failed(text));
                    }
                }
                LookupRequest::Status => {
                    if self.status.is_some() {
                        self.status = Some(Panel::Failed(self.error_message.clone()));
                    }
                }
            },
        }
    }

    pub fn flights(&self) -> &[FlightRecord] {
        match self.route {
            Route::Live => self.live.board.flights(),
            Route::History => self.history.board.flights(),
        }
    }

    pub fn current_error(&self) -> Option<&str> {
        match self.route {
            Route::Live => self.live.board.error(),
            Route::History => self.history.board.error(),
        }
    }

    pub fn loading(&self) -> bool {
        match self.route {
            Route::Live => self.live.is_active() && self.live.board.pending(),
            Route::History => self.history.is_active() && self.history.board.loading,
        }
    }

    pub fn last_success(&self) -> Option<SystemTime> {
        match self.route {
            Route::Live => self.live.board.last_success,
            Route::History => self.history.board.last_success,
        }
    }

    pub fn table_state_mut(&mut self) -> &mut TableState {
        match self.route {
            Route::Live => &mut self.live_table,
            Route::History => &mut self.history_table,
        }
    }

    pub fn selected_flight(&self) -> Option<&FlightRecord> {
        let state = match self.route {
            Route::Live => &self.live_table,
            Route::History => &self.history_table,
        };
        state.selected().and_then(|row| self.flights().get(row))
    }

    pub fn set_table_area(&mut self, area: Rect) {
        self.table_area = Some(area);
    }

    pub fn table_row_at(&self, y: u16) -> Option<usize> {
        let area = self.table_area?;
        if area.height < 3 {
            return None;
        }
        let data_top = area.y + 2;
        let data_bottom = area.y + area.height.saturating_sub(1);
        if y < data_top || y >= data_bottom {
            return None;
        }
        Some((y - data_top) as usize)
    }

    pub fn select_row(&mut self, row: usize) {
        let len = self.flights().len();
        let state = self.table_state_mut();
        if len == 0 {
            state.select(None);
            return;
        }
        state.select(Some(row.min(len - 1)));
    }

    pub fn next_row(&mut self) {
        let len = self.flights().len();
        if len == 0 {
            return;
        }
        let state = self.table_state_mut();
        let idx = state.selected().unwrap_or(0);
        let next = if idx + 1 >= len { 0 } else { idx + 1 };
        state.select(Some(next));
    }

    pub fn previous_row(&mut self) {
        let len = self.flights().len();
        if len == 0 {
            return;
        }
        let state = self.table_state_mut();
        let idx = state.selected().unwrap_or(0);
        let prev = if idx == 0 { len - 1 } else { idx - 1 };
        state.select(Some(prev));
    }

    pub fn open_detail(&mut self) {
        let Some(flight) = self.selected_flight().cloned() else {
            return;
        };
        self.input_mode = InputMode::Detail;
        match self.route {
            Route::Live => {
                debug!("detail lookup for {}", flight.id);
                self.detail_id = Some(flight.id.clone());
                self.detail = Some(Panel::Loading);
                if self.lookup_tx.send(LookupRequest::Flight(flight.id)).is_err() {
                    warn!("lookup worker is gone");
                    self.detail = Some(Panel::Failed(self.error_message.clone()));
                }
            }
            Route::History => {
                self.detail_id = Some(flight.id.clone());
                self.detail = Some(Panel::Ready(flight));
            }
        }
    }

    pub fn open_status(&mut self) {
        self.input_mode = InputMode::Status;
        self.status = Some(Panel::Loading);
        if self.lookup_tx.send(LookupRequest::Status).is_err() {
            warn!("lookup worker is gone");
            self.status = Some(Panel::Failed(self.error_message.clone()));
        }
    }

    pub fn open_help(&mut self) {
        self.input_mode = InputMode::Help;
    }

    pub fn close_popup(&mut self) {
        self.input_mode = InputMode::Normal;
        self.detail = None;
        self.detail_id = None;
        self.status = None;
    }

    pub fn toggle_theme(&mut self) {
        self.theme_mode = self.theme_mode.toggle();
        debug!("theme -> {}", self.theme_mode.label());
        match config::save_setting(&self.config_path, "theme", self.theme_mode.config_value()) {
            Ok(()) => {
                self.notice = Some((
                    format!("theme saved to {}", self.config_path.display()),
                    SystemTime::now(),
                ));
            }
            Err(err) => warn!("failed to save theme: {err:#}"),
        }
    }
}

fn selected_id(state: &TableState, flights: &[FlightRecord]) -> Option<String> {
    state
        .selected()
        .and_then(|row| flights.get(row))
        .map(|f| f.id.clone())
}

/// Keeps the cursor on the same flight after the list is replaced.
fn restore_selection(state: &mut TableState, flights: &[FlightRecord], key: Option<String>) {
    if flights.is_empty() {
        state.select(None);
        return;
    }
    if let Some(key) = key {
        if let Some(pos) = flights.iter().position(|f| f.id == key) {
            state.select(Some(pos));
            return;
        }
    }
    match state.selected() {
        Some(selected) if selected >= flights.len() => state.select(Some(flights.len() - 1)),
        None => state.select(Some(0)),
        _ => {}
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::lookup::spawn_lookup_worker;
    use crate::testing::{feed, flight, history_feed, recv_history, recv_live, recv_lookup, FakeSource};
    use std::sync::mpsc::{self, Receiver};
    use std::thread;
    use std::time::Duration;

    pub(crate) fn test_app(source: Arc<FakeSource>) -> (App, Receiver<FeedMessage>) {
        let (tx, rx) = mpsc::channel();
        let (lookup_tx, lookup_rx) = mpsc::channel();
        spawn_lookup_worker(source.clone(), lookup_rx, tx.clone()).unwrap();
        let config = Config {
            config_path: std::env::temp_dir().join("flightboard-app-test.toml"),
            ..Config::default()
        };
        let app = App::new(&config, source, tx, lookup_tx).unwrap();
        (app, rx)
    }

    #[test]
    fn route_paths_and_parsing() {
        assert_eq!(Route::Live.path(), "/");
        assert_eq!(Route::History.path(), "/history");
        assert_eq!(Route::from_str("/history"), Route::History);
        assert_eq!(Route::from_str("anything"), Route::Live);
        assert_eq!(Route::Live.next(), Route::History);
        assert_eq!(ThemeMode::from_str("mono"), ThemeMode::Monochrome);
        assert_eq!(ThemeMode::Monochrome.toggle(), ThemeMode::Default);
    }

    #[test]
    fn navigation_moves_the_poller() {
        let source = Arc::new(FakeSource::default());
        source.push_live(Ok(feed(vec![flight("a")], Some("2025-01-01T00:00:00Z"))));
        let (mut app, rx) = test_app(source.clone());

        app.start();
        assert!(app.live.is_active());
        app.handle_feed(FeedMessage::Live(recv_live(&rx)));
        assert_eq!(app.flights().len(), 1);

        app.switch_to(Route::History);
        assert!(!app.live.is_active());
        assert!(app.history.is_active());
        app.handle_feed(FeedMessage::History(recv_history(&rx)));
        assert_eq!(source.history_calls(), 1);

        app.switch_to(Route::Live);
        assert!(!app.history.is_active());
        assert!(app.live.is_active());
        app.handle_feed(FeedMessage::Live(recv_live(&rx)));

        app.switch_to(Route::History);
        app.handle_feed(FeedMessage::History(recv_history(&rx)));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(source.history_calls(), 2);
        assert_eq!(source.live_calls(), 2);

        app.shutdown();
        assert!(!app.live.is_active());
        assert!(!app.history.is_active());
    }

    #[test]
    fn reload_issues_one_more_history_request() {
        let source = Arc::new(FakeSource::default());
        let (mut app, rx) = test_app(source.clone());
        app.switch_to(Route::History);
        app.handle_feed(FeedMessage::History(recv_history(&rx)));
        app.reload();
        app.handle_feed(FeedMessage::History(recv_history(&rx)));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(source.history_calls(), 2);
        assert_eq!(source.live_calls(), 0);
    }

    #[test]
    fn selection_follows_the_flight() {
        let source = Arc::new(FakeSource::default());
        source.push_live(Ok(feed(vec![flight("a"), flight("b"), flight("c")], None)));
        source.push_live(Ok(feed(vec![flight("c"), flight("a")], None)));
        let (mut app, rx) = test_app(source);
        app.start();
        app.handle_feed(FeedMessage::Live(recv_live(&rx)));
        app.select_row(2);
        assert_eq!(app.selected_flight().map(|f| f.id.as_str()), Some("c"));

        app.reload();
        app.handle_feed(FeedMessage::Live(recv_live(&rx)));
        assert_eq!(app.live_table.selected(), Some(0));
        assert_eq!(app.selected_flight().map(|f| f.id.as_str()), Some("c"));
        app.shutdown();
    }

    #[test]
    fn live_detail_goes_through_lookup() {
        let source = Arc::new(FakeSource::default());
        let mut detailed = flight("a");
        detailed.registration = Some("4X-EKA".to_string());
        source.add_flight(detailed);
        source.push_live(Ok(feed(vec![flight("a"), flight("ghost")], None)));
        let (mut app, rx) = test_app(source);
        app.start();
        app.handle_feed(FeedMessage::Live(recv_live(&rx)));

        app.open_detail();
        assert_eq!(app.input_mode, InputMode::Detail);
        assert_eq!(app.detail, Some(Panel::Loading));
        app.handle_feed(FeedMessage::Lookup(recv_lookup(&rx)));
        match &app.detail {
            Some(Panel::Ready(record)) => assert_eq!(record.registration.as_deref(), Some("4X-EKA")),
            other => panic!("unexpected {other:?}"),
        }

        app.close_popup();
        app.next_row();
        app.open_detail();
        app.handle_feed(FeedMessage::Lookup(recv_lookup(&rx)));
        assert_eq!(app.detail, Some(Panel::Failed(NOT_FOUND_MESSAGE.to_string())));
        app.shutdown();
    }

    #[test]
    fn history_detail_uses_stored_record() {
        let source = Arc::new(FakeSource::default());
        source.push_history(Ok(history_feed(vec![flight("old")])));
        let (mut app, rx) = test_app(source.clone());
        app.switch_to(Route::History);
        app.handle_feed(FeedMessage::History(recv_history(&rx)));
        app.open_detail();
        assert_eq!(app.detail, Some(Panel::Ready(flight("old"))));
        assert_eq!(source.lookup_calls(), 0);
    }

    #[test]
    fn status_failure_uses_fixed_message() {
        let source = Arc::new(FakeSource::default());
        let (mut app, rx) = test_app(source);
        app.open_status();
        app.handle_feed(FeedMessage::Lookup(recv_lookup(&rx)));
        assert_eq!(
            app.status,
            Some(Panel::Failed("No connection to server".to_string()))
        );
        app.close_popup();
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.status.is_none());
    }
}
