//! Core types for kvmrelay

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// Console session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Serving,
    Stopped,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Initialized => write!(f, "initialized"),
            SessionState::Serving => write!(f, "serving"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Which browser family to try first when opening the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserPreference {
    /// Chrome-family browser, then the OS URL opener
    Auto,
    /// Firefox, then a Chrome-family browser, then the OS URL opener
    Firefox,
    /// Only the OS URL opener
    System,
}

impl Default for BrowserPreference {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for BrowserPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserPreference::Auto => write!(f, "auto"),
            BrowserPreference::Firefox => write!(f, "firefox"),
            BrowserPreference::System => write!(f, "system"),
        }
    }
}

impl FromStr for BrowserPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" | "chrome" | "chromium" => Ok(Self::Auto),
            "firefox" => Ok(Self::Firefox),
            "system" | "default" => Ok(Self::System),
            other => Err(Error::InvalidConfig(format!(
                "unknown browser '{}' (expected auto, firefox or system)",
                other
            ))),
        }
    }
}
