use std::{
    fmt::{Display, Formatter},
    time::Duration,
};

/// Breaker state as stored under `circuit:{provider}:state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// A missing or unreadable value means the circuit was never opened.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("open") => Self::Open,
            Some("half_open") => Self::HalfOpen,
            _ => Self::Closed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before a trial call.
    pub open_timeout: Duration,
    /// Successful trial calls needed to close a half-open circuit.
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    /// Whether a circuit opened at `opened_at` may let a trial call through
    /// at `now` (both unix seconds).
    pub fn reset_due(&self, opened_at: u64, now: u64) -> bool {
        now.saturating_sub(opened_at) >= self.open_timeout.as_secs()
    }
}
