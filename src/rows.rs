use chrono::{DateTime, FixedOffset, Local, NaiveDateTime};
use chrono_tz::Tz;

use crate::model::{present, FlightRecord};

pub const MISSING_AIRPORT: &str = "???";
pub const DASH: &str = "—";

pub const LIVE_COLUMNS: [&str; 6] = ["Flight", "Route", "Aircraft", "Altitude", "Speed", "Heading"];
pub const HISTORY_COLUMNS: [&str; 7] = [
    "Flight", "Route", "Aircraft", "Altitude", "Speed", "Heading", "Time",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardKind {
    Live,
    History,
}

/// How zero-valued altitude, speed and heading are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericPolicy {
    /// Live board prints zero, history board prints a dash.
    Legacy,
    /// Both boards print zero.
    Literal,
    /// Both boards treat zero as missing.
    Absent,
}

impl NumericPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" | "" => Some(NumericPolicy::Legacy),
            "literal" | "raw" | "zero" => Some(NumericPolicy::Literal),
            "absent" | "blank" | "dash" => Some(NumericPolicy::Absent),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NumericPolicy::Legacy => "legacy",
            NumericPolicy::Literal => "literal",
            NumericPolicy::Absent => "absent",
        }
    }

    fn zero_is_absent(self, board: BoardKind) -> bool {
        match self {
            NumericPolicy::Legacy => board == BoardKind::History,
            NumericPolicy::Literal => false,
            NumericPolicy::Absent => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlightRow {
    pub cells: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct RowMapper {
    policy: NumericPolicy,
    zone: Tz,
}

impl RowMapper {
    pub fn new(policy: NumericPolicy, zone: Tz) -> Self {
        Self { policy, zone }
    }

    pub fn policy(&self) -> NumericPolicy {
        self.policy
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn live(&self, flight: &FlightRecord) -> FlightRow {
        FlightRow {
            cells: self.common_cells(flight, BoardKind::Live),
        }
    }

    pub fn history(&self, flight: &FlightRecord) -> FlightRow {
        let mut cells = self.common_cells(flight, BoardKind::History);
        cells.push(zoned_time(flight.updated_at.as_deref(), self.zone));
        FlightRow { cells }
    }

    fn common_cells(&self, flight: &FlightRecord, board: BoardKind) -> Vec<String> {
        let blank_zero = self.policy.zero_is_absent(board);
        let grouped = board == BoardKind::History;
        vec![
            flight.callsign.clone(),
            route_text(flight),
            present(flight.aircraft.as_deref())
                .unwrap_or(DASH)
                .to_string(),
            measure(flight.altitude_ft, "ft", blank_zero, grouped),
            measure(flight.speed_kts, "kts", blank_zero, false),
            heading(flight.heading_deg, blank_zero),
        ]
    }
}

pub fn route_text(flight: &FlightRecord) -> String {
    format!(
        "{} → {}",
        present(flight.origin.as_deref()).unwrap_or(MISSING_AIRPORT),
        present(flight.destination.as_deref()).unwrap_or(MISSING_AIRPORT)
    )
}

fn measure(value: Option<f64>, unit: &str, blank_zero: bool, grouped: bool) -> String {
    match usable(value, blank_zero) {
        Some(v) if grouped => format!("{} {unit}", group_thousands(v)),
        Some(v) => format!("{} {unit}", fmt_number(v)),
        None => DASH.to_string(),
    }
}

fn heading(value: Option<f64>, blank_zero: bool) -> String {
    match usable(value, blank_zero) {
        Some(v) => format!("{}°", fmt_number(v)),
        None => DASH.to_string(),
    }
}

fn usable(value: Option<f64>, blank_zero: bool) -> Option<f64> {
    value
        .filter(|v| v.is_finite())
        .filter(|v| !(blank_zero && *v == 0.0))
}

pub fn fmt_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub fn group_thousands(value: f64) -> String {
    let text = fmt_number(value);
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (unsigned, None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Accepts RFC 3339 and offset-less ISO-8601 (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(trimmed).ok().or_else(|| {
        NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

pub fn local_clock(at: &DateTime<FixedOffset>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

pub fn zoned_time(raw: Option<&str>, zone: Tz) -> String {
    raw.and_then(parse_timestamp)
        .map(|at| at.with_timezone(&zone).format("%H:%M").to_string())
        .unwrap_or_else(|| DASH.to_string())
}
