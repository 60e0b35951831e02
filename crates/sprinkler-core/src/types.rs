use crate::error::{Result, SprinklerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ActuatorState
// ---------------------------------------------------------------------------

/// One snapshot of the remote on/off document.
///
/// `off_time` only means something while `is_on` is set; an "on" snapshot
/// without it stays on until an explicit "off" arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorState {
    pub is_on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_time: Option<DateTime<Utc>>,
}

impl ActuatorState {
    pub fn off() -> Self {
        Self {
            is_on: false,
            off_time: None,
        }
    }

    pub fn on() -> Self {
        Self {
            is_on: true,
            off_time: None,
        }
    }

    pub fn on_until(off_time: DateTime<Utc>) -> Self {
        Self {
            is_on: true,
            off_time: Some(off_time),
        }
    }

    /// Decode a raw document. A missing or mistyped `isOn` is rejected
    /// rather than defaulted.
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| SprinklerError::StateFormat(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// Physical state of the relay line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::High => "high",
            Level::Low => "low",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// A single audit line. Renders as `Time: <millis>\tStatus: <True|False>\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp_millis: i64,
    pub status: bool,
}

impl LogEntry {
    pub fn new(timestamp_millis: i64, status: bool) -> Self {
        Self {
            timestamp_millis,
            status,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.status { "True" } else { "False" };
        writeln!(f, "Time: {}\tStatus: {status}", self.timestamp_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_on_with_off_time() {
        let state =
            ActuatorState::from_json(br#"{"isOn": true, "offTime": "2024-06-01T12:00:00Z"}"#)
                .unwrap();
        assert!(state.is_on);
        assert_eq!(
            state.off_time,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn null_off_time_is_absent() {
        let state = ActuatorState::from_json(br#"{"isOn": true, "offTime": null}"#).unwrap();
        assert_eq!(state, ActuatorState::on());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let state = ActuatorState::from_json(br#"{"isOn": false, "zone": "front"}"#).unwrap();
        assert_eq!(state, ActuatorState::off());
    }

    #[test]
    fn missing_is_on_is_rejected() {
        let err = ActuatorState::from_json(br#"{"offTime": "2024-06-01T12:00:00Z"}"#).unwrap_err();
        assert!(matches!(err, SprinklerError::StateFormat(_)), "{err:?}");
    }

    #[test]
    fn non_bool_is_on_is_rejected() {
        let err = ActuatorState::from_json(br#"{"isOn": "yes"}"#).unwrap_err();
        assert!(matches!(err, SprinklerError::StateFormat(_)));
    }

    #[test]
    fn bad_off_time_is_rejected() {
        let err = ActuatorState::from_json(br#"{"isOn": true, "offTime": "soon"}"#).unwrap_err();
        assert!(matches!(err, SprinklerError::StateFormat(_)));
    }

    #[test]
    fn off_serializes_without_off_time() {
        let json = serde_json::to_string(&ActuatorState::off()).unwrap();
        assert_eq!(json, r#"{"isOn":false}"#);
    }

    #[test]
    fn log_entry_renders_python_style_bool() {
        assert_eq!(
            LogEntry::new(1000, false).to_string(),
            "Time: 1000\tStatus: False\n"
        );
        assert_eq!(
            LogEntry::new(42, true).to_string(),
            "Time: 42\tStatus: True\n"
        );
    }
}
