use crate::config::HostConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// One snapshot of a health check. Built once per check, never mutated after.
#[derive(Debug, Clone)]
pub struct HostStatus {
    pub config: HostConfig,
    pub online: bool,
    /// load average
    pub cpu: Option<String>,
    /// used/total
    pub memory: Option<String>,
    /// used%
    pub disk: Option<String>,
    pub uptime: Option<String>,
    pub last_check: DateTime<Utc>,
    pub error: Option<String>,
}

impl HostStatus {
    pub fn offline(config: HostConfig, last_check: DateTime<Utc>, error: String) -> HostStatus {
        HostStatus {
            config,
            online: false,
            cpu: None,
            memory: None,
            disk: None,
            uptime: None,
            last_check,
            error: Some(error),
        }
    }

    pub fn state(&self) -> HostState {
        HostState::from(self.online)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Up,
    Down,
}

impl HostState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Up => "up",
            HostState::Down => "down",
        }
    }
}

impl From<bool> for HostState {
    fn from(online: bool) -> Self {
        if online {
            HostState::Up
        } else {
            HostState::Down
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host's online flag changed between two consecutive batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub host: String,
    pub label: String,
    pub state: HostState,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            HostState::Down => write!(f, "{} ({}) went DOWN", self.label, self.host),
            HostState::Up => write!(f, "{} ({}) came UP", self.label, self.host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_messages() {
        let down = Transition {
            host: "10.0.0.5".to_string(),
            label: "Web".to_string(),
            state: HostState::Down,
        };
        assert_eq!(down.to_string(), "Web (10.0.0.5) went DOWN");
        let up = Transition {
            state: HostState::Up,
            ..down
        };
        assert_eq!(up.to_string(), "Web (10.0.0.5) came UP");
    }

    #[test]
    fn offline_status_carries_error_only() {
        let hc = HostConfig::new("web", "10.0.0.5", "ops");
        let st = HostStatus::offline(hc, Utc::now(), "dial: refused".to_string());
        assert!(!st.online);
        assert_eq!(st.state(), HostState::Down);
        assert_eq!(st.error.as_deref(), Some("dial: refused"));
        assert!(st.cpu.is_none() && st.memory.is_none() && st.disk.is_none() && st.uptime.is_none());
    }
}
