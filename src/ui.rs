use chrono::{DateTime, Local};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use ratatui::Frame;
use std::time::{Duration, SystemTime};

use crate::app::{App, InputMode, Panel, Route, ThemeMode};
use crate::model::{present, FlightRecord};
use crate::rows::{
    fmt_number, local_clock, parse_timestamp, zoned_time, FlightRow, DASH, HISTORY_COLUMNS,
    LIVE_COLUMNS,
};

pub const LIVE_PLACEHOLDER: &str = "No flights overhead right now";
pub const HISTORY_PLACEHOLDER: &str = "No flight history yet";

const MAX_COLUMN_WIDTH: usize = 28;

struct Theme {
    accent: Color,
    warn: Color,
    danger: Color,
    dim: Color,
    ok: Color,
    highlight_fg: Color,
    highlight_bg: Color,
    row_even_bg: Color,
    row_odd_bg: Color,
    header_bg: Color,
    panel_bg: Color,
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(size);

    render_header(f, chunks[0], app);
    render_banner(f, chunks[1], app);
    render_table(f, chunks[2], app);
    render_footer(f, chunks[3], app);

    match app.input_mode {
        InputMode::Normal => {}
        InputMode::Help => render_help_menu(f, size, app),
        InputMode::Detail => render_detail(f, size, app),
        InputMode::Status => render_status(f, size, app),
    }
}

pub fn board_title(app: &App) -> String {
    match app.route {
        Route::Live => format!("✈ {} — {}", app.title, app.site),
        Route::History => format!("✈ History — {}", app.site),
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);

    let mut tabs = Vec::new();
    for route in Route::ALL {
        let style = if route == app.route {
            Style::default()
                .fg(theme.highlight_fg)
                .bg(theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.dim)
        };
        tabs.push(Span::styled(format!(" {} ", route.label()), style));
        tabs.push(Span::raw(" "));
    }
    tabs.push(Span::styled(
        board_title(app),
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    ));

    let detail = match app.route {
        Route::Live => format!("UPDATED {}", app.live.board.header_time()),
        Route::History => app.history.board.summary(),
    };
    let (status, status_color) = if app.current_error().is_some() {
        ("ERR", theme.danger)
    } else if app.loading() {
        ("LOADING", theme.warn)
    } else {
        ("OK", theme.ok)
    };
    let last = app
        .last_success()
        .map(format_system_time)
        .unwrap_or_else(|| DASH.to_string());

    let line_bottom = Line::from(vec![
        Span::styled(detail, Style::default().fg(Color::Cyan)),
        Span::raw(" | "),
        Span::raw(format!("FLIGHTS {}", app.flights().len())),
        Span::raw(" | "),
        Span::raw(format!("LAST {last}")),
        Span::raw(" | "),
        Span::raw(format!("THEME {}", app.theme_mode.label())),
        Span::raw(" | "),
        Span::styled(
            status,
            Style::default()
                .fg(status_color)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("FLIGHTBOARD");
    let paragraph = Paragraph::new(vec![Line::from(tabs), line_bottom])
        .block(block)
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn render_banner(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let line = if let Some(err) = app.current_error() {
        Line::from(Span::styled(
            format!(" ⚠ {err}"),
            Style::default()
                .fg(theme.danger)
                .add_modifier(Modifier::BOLD),
        ))
    } else if app.loading() {
        Line::from(Span::styled(" Loading…", Style::default().fg(theme.dim)))
    } else {
        Line::from("")
    };
    let paragraph = Paragraph::new(line).style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let theme = theme(app.theme_mode);
    app.set_table_area(area);

    let (columns, rows, title, placeholder): (&[&str], Vec<FlightRow>, &str, &str) =
        match app.route {
            Route::Live => (
                &LIVE_COLUMNS,
                app.flights().iter().map(|f| app.mapper.live(f)).collect(),
                "OVERHEAD",
                LIVE_PLACEHOLDER,
            ),
            Route::History => (
                &HISTORY_COLUMNS,
                app.flights().iter().map(|f| app.mapper.history(f)).collect(),
                "LAST 24H",
                HISTORY_PLACEHOLDER,
            ),
        };

    let widths = compute_column_widths(columns, &rows);
    let header_cells = columns.iter().map(|label| {
        Cell::from(*label).style(
            Style::default()
                .fg(theme.accent)
                .bg(theme.header_bg)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(theme.header_bg))
        .height(1);

    let empty = rows.is_empty();
    let table_rows = rows.into_iter().enumerate().map(|(i, row)| {
        let style = if i % 2 == 0 {
            Style::default().bg(theme.row_even_bg)
        } else {
            Style::default().bg(theme.row_odd_bg)
        };
        let cells = row
            .cells
            .into_iter()
            .enumerate()
            .map(|(col, text)| {
                let cell = Cell::from(truncate(&text, MAX_COLUMN_WIDTH));
                if col == 0 {
                    cell.style(Style::default().add_modifier(Modifier::BOLD))
                } else {
                    cell
                }
            });
        Row::new(cells).style(style)
    });

    let constraints: Vec<Constraint> = widths.iter().map(|w| Constraint::Length(*w)).collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .title(title)
        .style(Style::default().bg(theme.panel_bg));

    let table = Table::new(table_rows, constraints)
        .header(header)
        .block(block)
        .column_spacing(2)
        .style(Style::default().bg(theme.panel_bg))
        .row_highlight_style(
            Style::default()
                .fg(theme.highlight_fg)
                .bg(theme.highlight_bg)
                .add_modifier(Modifier::BOLD),
        );

    f.render_stateful_widget(table, area, app.table_state_mut());

    if empty && !app.loading() && area.height > 3 && area.width > 2 {
        let inner = Rect {
            x: area.x + 1,
            y: area.y + 2,
            width: area.width - 2,
            height: 1,
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(
            placeholder,
            Style::default().fg(theme.dim),
        )))
        .centered();
        f.render_widget(paragraph, inner);
    }
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let mut help =
        "q quit  1/2 view  Tab switch  ↑/↓ move  Enter detail  r reload  i status  t theme  ? help"
            .to_string();
    help.push_str(&format!(
        "  ROUTE {}  REF {}  SRC {}",
        app.route.path(),
        format_refresh(app.live.interval()),
        short_source(&app.source_url)
    ));

    let mut spans = vec![Span::styled(help, Style::default().fg(theme.dim))];
    if let Some((note, when)) = &app.notice {
        if let Ok(delta) = SystemTime::now().duration_since(*when) {
            if delta <= Duration::from_secs(6) {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(
                    note.clone(),
                    Style::default()
                        .fg(theme.accent)
                        .add_modifier(Modifier::BOLD),
                ));
            }
        }
    }
    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn render_help_menu(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let popup = centered_rect(60, 18, area);
    f.render_widget(Clear, popup);

    let section = |title: &'static str| {
        Line::from(Span::styled(
            title,
            Style::default().fg(theme.dim).add_modifier(Modifier::BOLD),
        ))
    };
    let lines = vec![
        section("Views"),
        Line::from("  1 / 2      Live board / 24h history"),
        Line::from("  Tab        Switch view"),
        Line::from("  r          Reload current view"),
        Line::from(""),
        section("Flights"),
        Line::from("  ↑/↓        Move selection"),
        Line::from("  Mouse      Scroll to move • Click row to select"),
        Line::from("  Enter      Flight detail"),
        Line::from("  i          Server status"),
        Line::from(""),
        section("Other"),
        Line::from("  t          Cycle theme (saved to config)"),
        Line::from("  ? / h      Toggle help"),
        Line::from("  q          Quit"),
        Line::from(""),
        Line::from(Span::styled("Press Esc to close", Style::default().fg(theme.dim))),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("HELP");
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, popup);
}

fn render_detail(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let popup = centered_rect(60, 18, area);
    f.render_widget(Clear, popup);

    let lines = match &app.detail {
        Some(Panel::Ready(flight)) => detail_lines(app, flight)
            .into_iter()
            .map(|(label, value)| {
                Line::from(vec![
                    Span::styled(format!("{label:<14}"), Style::default().fg(theme.dim)),
                    Span::raw(value),
                ])
            })
            .collect(),
        Some(Panel::Failed(message)) => vec![Line::from(Span::styled(
            message.clone(),
            Style::default().fg(theme.danger).add_modifier(Modifier::BOLD),
        ))],
        Some(Panel::Loading) | None => vec![Line::from(Span::styled(
            "Loading…",
            Style::default().fg(theme.dim),
        ))],
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("FLIGHT");
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, popup);
}

/// Label/value pairs for the detail popup, formatted like the active board.
fn detail_lines(app: &App, flight: &FlightRecord) -> Vec<(&'static str, String)> {
    let row = match app.route {
        Route::Live => app.mapper.live(flight),
        Route::History => app.mapper.history(flight),
    };
    let cell = |idx: usize| row.cells.get(idx).cloned().unwrap_or_else(|| DASH.to_string());
    let text = |value: Option<&str>| present(value).unwrap_or(DASH).to_string();

    let position = match (flight.latitude, flight.longitude) {
        (Some(lat), Some(lon)) => format!("{lat:.4}, {lon:.4}"),
        _ => DASH.to_string(),
    };
    let vertical = flight
        .vertical_speed
        .filter(|v| v.is_finite())
        .map(|v| format!("{} ft/min", fmt_number(v)))
        .unwrap_or_else(|| DASH.to_string());
    let on_ground = match flight.on_ground {
        Some(true) => "yes".to_string(),
        Some(false) => "no".to_string(),
        None => DASH.to_string(),
    };

    vec![
        ("Flight", cell(0)),
        ("Route", cell(1)),
        ("Aircraft", cell(2)),
        ("Registration", text(flight.registration.as_deref())),
        ("Airline", text(flight.airline_icao.as_deref())),
        ("Altitude", cell(3)),
        ("Speed", cell(4)),
        ("Heading", cell(5)),
        ("Vertical", vertical),
        ("Position", position),
        ("On ground", on_ground),
        (
            "Seen",
            zoned_time(flight.updated_at.as_deref(), app.mapper.zone()),
        ),
    ]
}

fn render_status(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let popup = centered_rect(50, 9, area);
    f.render_widget(Clear, popup);

    let label = |text: &'static str| Span::styled(format!("{text:<10}"), Style::default().fg(theme.dim));
    let lines = match &app.status {
        Some(Panel::Ready(status)) => {
            let updated = status
                .updated_at
                .as_deref()
                .and_then(parse_timestamp)
                .map(|at| local_clock(&at))
                .unwrap_or_else(|| DASH.to_string());
            let healthy = status.status.eq_ignore_ascii_case("ok");
            vec![
                Line::from(vec![
                    label("Status"),
                    Span::styled(
                        present(Some(status.status.as_str())).unwrap_or(DASH).to_string(),
                        Style::default()
                            .fg(if healthy { theme.ok } else { theme.warn })
                            .add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(vec![
                    label("Flights"),
                    Span::raw(
                        status
                            .flights_count
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| DASH.to_string()),
                    ),
                ]),
                Line::from(vec![label("Updated"), Span::raw(updated)]),
                Line::from(vec![label("Source"), Span::raw(short_source(&app.source_url))]),
            ]
        }
        Some(Panel::Failed(message)) => vec![Line::from(Span::styled(
            message.clone(),
            Style::default().fg(theme.danger).add_modifier(Modifier::BOLD),
        ))],
        Some(Panel::Loading) | None => vec![Line::from(Span::styled(
            "Loading…",
            Style::default().fg(theme.dim),
        ))],
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("SERVER");
    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, popup);
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let height = height.min(area.height.saturating_sub(2)).max(3);
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(height),
            Constraint::Min(1),
        ])
        .split(area);
    let vertical = popup_layout[1];
    let width = (vertical.width * percent_x / 100).max(20);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(width),
            Constraint::Min(1),
        ])
        .split(vertical);
    horizontal[1]
}

fn compute_column_widths(columns: &[&str], rows: &[FlightRow]) -> Vec<u16> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let widest = rows
                .iter()
                .filter_map(|row| row.cells.get(idx))
                .map(|cell| text_len(cell))
                .max()
                .unwrap_or(0);
            widest.max(text_len(label)).min(MAX_COLUMN_WIDTH) as u16
        })
        .collect()
}

fn text_len(value: &str) -> usize {
    value.chars().count()
}

fn truncate(value: &str, max: usize) -> String {
    if text_len(value) <= max {
        value.to_string()
    } else if max <= 1 {
        value.chars().take(max).collect()
    } else {
        let head: String = value.chars().take(max - 1).collect();
        format!("{head}…")
    }
}

fn format_system_time(time: SystemTime) -> String {
    let dt: DateTime<Local> = time.into();
    dt.format("%H:%M:%S").to_string()
}

fn format_refresh(interval: Duration) -> String {
    if interval.subsec_millis() == 0 {
        format!("{}s", interval.as_secs())
    } else {
        format!("{}ms", interval.as_millis())
    }
}

fn short_source(url: &str) -> String {
    let mut text = url.trim().to_string();
    if let Some(pos) = text.find("://") {
        text = text[(pos + 3)..].to_string();
    }
    if let Some(pos) = text.find('/') {
        text.truncate(pos);
    }
    if text_len(&text) > 24 {
        text = text.chars().take(24).collect();
    }
    if text.is_empty() {
        "--".to_string()
    } else {
        text
    }
}

fn theme(mode: ThemeMode) -> Theme {
    match mode {
        ThemeMode::Default => Theme {
            accent: Color::Yellow,
            warn: Color::Yellow,
            danger: Color::Red,
            dim: Color::DarkGray,
            ok: Color::Green,
            highlight_fg: Color::Black,
            highlight_bg: Color::Rgb(200, 200, 200),
            row_even_bg: Color::Rgb(20, 20, 24),
            row_odd_bg: Color::Rgb(12, 12, 16),
            header_bg: Color::Rgb(24, 24, 28),
            panel_bg: Color::Rgb(18, 18, 22),
        },
        ThemeMode::Amber => Theme {
            accent: Color::Rgb(255, 191, 0),
            warn: Color::Rgb(255, 220, 120),
            danger: Color::LightRed,
            dim: Color::Rgb(140, 110, 40),
            ok: Color::Rgb(255, 191, 0),
            highlight_fg: Color::Black,
            highlight_bg: Color::Rgb(255, 220, 120),
            row_even_bg: Color::Rgb(28, 22, 12),
            row_odd_bg: Color::Rgb(20, 16, 10),
            header_bg: Color::Rgb(32, 24, 14),
            panel_bg: Color::Rgb(24, 18, 10),
        },
        ThemeMode::Monochrome => Theme {
            accent: Color::White,
            warn: Color::Gray,
            danger: Color::White,
            dim: Color::DarkGray,
            ok: Color::Gray,
            highlight_fg: Color::Black,
            highlight_bg: Color::White,
            row_even_bg: Color::Black,
            row_odd_bg: Color::Black,
            header_bg: Color::Black,
            panel_bg: Color::Black,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::app::FeedMessage;
    use crate::history::HistoryUpdate;
    use crate::live::LiveUpdate;
    use crate::net::FetchError;
    use crate::testing::{feed, flight, history_feed, FakeSource};
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::Terminal;
    use std::sync::Arc;

    fn screen(buffer: &Buffer) -> String {
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 24)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        screen(terminal.backend().buffer())
    }

    #[test]
    fn text_helpers() {
        assert_eq!(truncate("ABCDE", 3), "AB…");
        assert_eq!(truncate("AB", 3), "AB");
        assert_eq!(text_len("→"), 1);
        assert_eq!(short_source("http://localhost:8000/api"), "localhost:8000");
        assert_eq!(short_source(""), "--");
        assert_eq!(
            short_source("http://a✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈✈.example"),
            format!("a{}", "✈".repeat(23))
        );
        assert_eq!(format_refresh(Duration::from_secs(10)), "10s");
        assert_eq!(format_refresh(Duration::from_millis(1500)), "1500ms");
    }

    #[test]
    fn widths_fit_header_and_cells() {
        let rows = vec![FlightRow {
            cells: vec!["ELY001".to_string(), "x".repeat(40)],
        }];
        assert_eq!(compute_column_widths(&["Flight", "Route"], &rows), vec![6, 28]);
        assert_eq!(compute_column_widths(&["Flight"], &[]), vec![6]);
    }

    #[test]
    fn empty_live_board_shows_placeholder() {
        let (mut app, _rx) = test_app(Arc::new(FakeSource::default()));
        app.live.activate();
        app.handle_feed(FeedMessage::Live(LiveUpdate {
            epoch: 1,
            seq: 1,
            result: Ok(feed(vec![], None)),
        }));
        let text = draw(&mut app);
        assert!(text.contains(LIVE_PLACEHOLDER));
        assert!(text.contains("Tel Aviv — Rosh Pina 28"));
        assert!(text.contains("Heading"));
        assert!(!text.contains("Time"));
        app.shutdown();
    }

    #[test]
    fn failed_first_fetch_still_shows_placeholder() {
        let (mut app, _rx) = test_app(Arc::new(FakeSource::default()));
        app.live.activate();
        app.handle_feed(FeedMessage::Live(LiveUpdate {
            epoch: 1,
            seq: 1,
            result: Err(FetchError::Status(500)),
        }));
        assert!(!app.loading());
        let text = draw(&mut app);
        assert!(text.contains("No connection to server"));
        assert!(text.contains(LIVE_PLACEHOLDER));
        assert!(!text.contains("Loading"));
        app.shutdown();
    }

    #[test]
    fn live_failure_shows_banner_over_rows() {
        let (mut app, _rx) = test_app(Arc::new(FakeSource::default()));
        app.live.board.apply(1, Ok(feed(vec![flight("ely001")], None)));
        app.live.board.apply(2, Err(FetchError::Status(502)));
        let text = draw(&mut app);
        assert!(text.contains("No connection to server"));
        assert!(text.contains("ELY001"));
        assert!(text.contains("??? → ???"));
    }

    #[test]
    fn history_board_header_and_placeholder() {
        let (mut app, _rx) = test_app(Arc::new(FakeSource::default()));
        app.switch_to(Route::History);
        app.handle_feed(FeedMessage::History(HistoryUpdate {
            epoch: 1,
            result: Ok(history_feed(vec![])),
        }));
        let text = draw(&mut app);
        assert!(text.contains("History — Rosh Pina 28"));
        assert!(text.contains("0 flights in last 24h"));
        assert!(text.contains(HISTORY_PLACEHOLDER));
        assert!(text.contains("/history"));
    }

    #[test]
    fn detail_popup_renders_record() {
        let (mut app, _rx) = test_app(Arc::new(FakeSource::default()));
        let mut record = flight("ely001");
        record.registration = Some("4X-EKA".to_string());
        record.altitude_ft = Some(0.0);
        app.switch_to(Route::History);
        app.handle_feed(FeedMessage::History(HistoryUpdate {
            epoch: 1,
            result: Ok(history_feed(vec![record])),
        }));
        app.open_detail();
        let text = draw(&mut app);
        assert!(text.contains("FLIGHT"));
        assert!(text.contains("4X-EKA"));
    }
}
