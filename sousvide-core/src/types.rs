//! Core types shared by the transport and the control loop

use crate::error::{Result, SousVideError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Heater state. Starts `Off`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatState {
    #[default]
    Off,
    On,
}

impl HeatState {
    pub fn is_on(self) -> bool {
        matches!(self, HeatState::On)
    }

    /// Signal that drives the heater into this state
    pub fn signal(self) -> Signal {
        match self {
            HeatState::Off => Signal::HeatOff,
            HeatState::On => Signal::HeatOn,
        }
    }
}

impl From<bool> for HeatState {
    fn from(on: bool) -> Self {
        if on {
            HeatState::On
        } else {
            HeatState::Off
        }
    }
}

impl fmt::Display for HeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatState::Off => f.write_str("OFF"),
            HeatState::On => f.write_str("ON"),
        }
    }
}

/// Single-byte control codes sent host to device
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Heat off (`'0'`)
    HeatOff = b'0',
    /// Heat on (`'1'`)
    HeatOn = b'1',
    /// Request a temperature sample (`'2'`)
    RequestTemperature = b'2',
}

impl Signal {
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// An integer temperature reading in degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reading(pub i32);

impl Reading {
    pub fn degrees(self) -> i32 {
        self.0
    }
}

impl FromStr for Reading {
    type Err = SousVideError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        text.parse::<i32>()
            .map(Reading)
            .map_err(|e| SousVideError::Parse(format!("Invalid reading {:?}: {}", text, e)))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heat_state_defaults_off() {
        assert_eq!(HeatState::default(), HeatState::Off);
        assert!(!HeatState::default().is_on());
    }

    #[test]
    fn test_heat_state_signal_mapping() {
        assert_eq!(HeatState::On.signal(), Signal::HeatOn);
        assert_eq!(HeatState::Off.signal(), Signal::HeatOff);
    }

    #[test]
    fn test_signal_values() {
        assert_eq!(Signal::HeatOff.as_byte(), b'0');
        assert_eq!(Signal::HeatOn.as_byte(), b'1');
        assert_eq!(Signal::RequestTemperature.as_byte(), b'2');
    }

    #[test]
    fn test_reading_parse() {
        assert_eq!(" 72 ".parse::<Reading>().unwrap(), Reading(72));
        assert_eq!("-4".parse::<Reading>().unwrap(), Reading(-4));
        assert_eq!("+130".parse::<Reading>().unwrap(), Reading(130));
    }

    #[test]
    fn test_reading_parse_rejects_garbage() {
        assert!("".parse::<Reading>().is_err());
        assert!("72.5".parse::<Reading>().is_err());
        assert!("ERR".parse::<Reading>().is_err());
        assert!("72\n99".parse::<Reading>().is_err());
    }
}
