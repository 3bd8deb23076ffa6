use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `GET /flights`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LiveFeed {
    #[serde(default, deserialize_with = "de_flights")]
    pub flights: Vec<FlightRecord>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64_from_any")]
    pub count: Option<u64>,
}

/// Body of `GET /flights/history`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct HistoryFeed {
    #[serde(default, deserialize_with = "de_flights")]
    pub flights: Vec<FlightRecord>,
    #[serde(default, deserialize_with = "de_opt_u64_from_any")]
    pub count: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FlightRecord {
    #[serde(deserialize_with = "de_string_from_any")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string_from_any")]
    pub callsign: String,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub aircraft: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub altitude_ft: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub speed_kts: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub heading_deg: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub registration: Option<String>,
    #[serde(default)]
    pub airline_icao: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub vertical_speed: Option<f64>,
    #[serde(default)]
    pub on_ground: Option<bool>,
}

/// Body of `GET /status`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "de_opt_u64_from_any")]
    pub flights_count: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// The server's own `count` when it disagrees with the rows it sent.
/// Rows always win; the count is only worth a log line.
pub fn count_mismatch(count: Option<u64>, rows: usize) -> Option<u64> {
    count.filter(|c| *c != rows as u64)
}

/// Trimmed, non-empty text or `None`.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn de_flights<'de, D>(deserializer: D) -> Result<Vec<FlightRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let flights: Option<Vec<FlightRecord>> = Option::deserialize(deserializer)?;
    Ok(flights.unwrap_or_default())
}

fn de_string_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn de_opt_f64_from_any<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected float-compatible number")),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(trimmed.parse::<f64>().ok())
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

fn de_opt_u64_from_any<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => {
            if let Some(value) = number.as_u64() {
                Ok(Some(value))
            } else if let Some(value) = number.as_f64() {
                Ok(Some(value.max(0.0) as u64))
            } else {
                Ok(None)
            }
        }
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else if let Ok(value) = trimmed.parse::<u64>() {
                Ok(Some(value))
            } else if let Ok(value) = trimmed.parse::<f64>() {
                Ok(Some(value.max(0.0) as u64))
            } else {
                Ok(None)
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{count_mismatch, present, HistoryFeed, LiveFeed, ServerStatus};

    const LIVE: &str = r#"{
        "count": 2,
        "flights": [
            {
                "id": "3a1f2c9d",
                "callsign": "ELY027",
                "airline_icao": "ELY",
                "aircraft": "B789",
                "registration": "4X-EDF",
                "origin": "JFK",
                "destination": "TLV",
                "latitude": 32.98,
                "longitude": 35.58,
                "altitude_ft": 2100,
                "speed_kts": 168,
                "heading_deg": 112,
                "vertical_speed": -768,
                "on_ground": false,
                "updated_at": "2025-03-14T18:42:07.512345+02:00"
            },
            { "id": "3a1f30aa", "callsign": "—", "origin": null, "altitude_ft": null }
        ],
        "updated_at": "2025-03-14T18:42:08.001+02:00"
    }"#;

    #[test]
    fn parse_live_feed() {
        let data: LiveFeed = serde_json::from_str(LIVE).unwrap();
        assert_eq!(data.count, Some(2));
        assert_eq!(data.flights.len(), 2);
        assert_eq!(
            data.updated_at.as_deref(),
            Some("2025-03-14T18:42:08.001+02:00")
        );

        let first = &data.flights[0];
        assert_eq!(first.callsign, "ELY027");
        assert_eq!(first.origin.as_deref(), Some("JFK"));
        assert_eq!(first.altitude_ft, Some(2100.0));
        assert_eq!(first.vertical_speed, Some(-768.0));
        assert_eq!(first.on_ground, Some(false));

        let second = &data.flights[1];
        assert!(second.origin.is_none());
        assert!(second.destination.is_none());
        assert!(second.altitude_ft.is_none());
    }

    #[test]
    fn parse_empty_server_snapshot() {
        let data: LiveFeed =
            serde_json::from_str(r#"{"count": 0, "flights": [], "updated_at": null}"#).unwrap();
        assert!(data.flights.is_empty());
        assert!(data.updated_at.is_none());

        let data: HistoryFeed = serde_json::from_str(r#"{"flights": null}"#).unwrap();
        assert!(data.flights.is_empty());
    }

    #[test]
    fn parse_numeric_fallbacks() {
        let data: HistoryFeed = serde_json::from_str(
            r#"{"count": "3", "flights": [{"id": 17, "callsign": "ISR712", "speed_kts": "142", "heading_deg": ""}]}"#,
        )
        .unwrap();
        assert_eq!(data.count, Some(3));
        assert_eq!(data.flights[0].id, "17");
        assert_eq!(data.flights[0].speed_kts, Some(142.0));
        assert_eq!(data.flights[0].heading_deg, None);
    }

    #[test]
    fn malformed_feed_is_rejected() {
        assert!(serde_json::from_str::<LiveFeed>(r#"{"flights": "nope"}"#).is_err());
        assert!(serde_json::from_str::<LiveFeed>("<html>").is_err());
    }

    #[test]
    fn parse_status() {
        let status: ServerStatus = serde_json::from_str(
            r#"{"status": "ok", "flights_count": 4, "updated_at": "2025-03-14T18:42:08+02:00"}"#,
        )
        .unwrap();
        assert_eq!(status.status, "ok");
        assert_eq!(status.flights_count, Some(4));
    }

    #[test]
    fn count_only_reported_when_off() {
        assert_eq!(count_mismatch(Some(3), 3), None);
        assert_eq!(count_mismatch(None, 3), None);
        assert_eq!(count_mismatch(Some(5), 3), Some(5));
    }

    #[test]
    fn present_trims_blanks() {
        assert_eq!(present(Some("  TLV ")), Some("TLV"));
        assert_eq!(present(Some("   ")), None);
        assert_eq!(present(None), None);
    }
}
