//! Check states

use serde::{Deserialize, Deserializer};
use serde_repr::Serialize_repr;
use std::fmt;
use std::str::FromStr;

/// State of a check result
///
/// Icinga2 sends the numeric code on the wire, as an integer or a float
/// (`2.0`); configuration files and ticket texts use the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr)]
#[repr(u8)]
pub enum State {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl State {
    pub const ALL: [State; 4] = [State::Ok, State::Warning, State::Critical, State::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Ok => "OK",
            State::Warning => "Warning",
            State::Critical => "Critical",
            State::Unknown => "Unknown",
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == State::Ok
    }

    /// State for a wire code; only whole numbers 0 to 3 are valid
    pub fn from_code(code: f64) -> Option<Self> {
        if code.fract() != 0.0 {
            return None;
        }
        match code as i64 {
            0 => Some(State::Ok),
            1 => Some(State::Warning),
            2 => Some(State::Critical),
            3 => Some(State::Unknown),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // f64 accepts both integer and float JSON numbers
        let code = f64::deserialize(deserializer)?;
        State::from_code(code).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid check state {}, expected 0 to 3", code))
        })
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" | "0" => Ok(State::Ok),
            "warning" | "1" => Ok(State::Warning),
            "critical" | "2" => Ok(State::Critical),
            "unknown" | "3" => Ok(State::Unknown),
            other => Err(format!(
                "unknown state '{}', expected one of OK, Warning, Critical, Unknown",
                other
            )),
        }
    }
}

/// Serde helpers for lists of states written by name, e.g. `[OK, Critical]`
pub mod names {
    use super::State;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(states: &[State], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(states.iter().map(State::as_str))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<State>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| s.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}
