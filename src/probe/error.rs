use std::fmt::Write;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Renders an error together with its `source()` chain on a single line.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let cause = src.to_string();
        // io errors often repeat their source in their own Display.
        if !s.contains(&cause) {
            let _ = write!(s, ": {}", cause);
        }
        err = src;
    }
    s
}

/// Failure taxonomy shared by every probe.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    #[error("{0}")]
    Resolution(String),

    #[error("{0}")]
    Connect(String),

    #[error("{phase} timed out after {:.1}s", after.as_secs_f64())]
    Timeout { phase: &'static str, after: Duration },

    #[error("{0}")]
    Handshake(String),

    #[error("{0}")]
    Protocol(String),

    #[error("{0}")]
    Subprocess(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("Simulated failure injected")]
    Simulated,
}

/// Serializable tag for a [`ProbeError`], carried in the report next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ResolutionFailure,
    ConnectFailure,
    Timeout,
    HandshakeFailure,
    ProtocolError,
    SubprocessFailure,
    Unsupported,
    SimulatedFailure,
}

impl ProbeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::Resolution(_) => ErrorKind::ResolutionFailure,
            ProbeError::Connect(_) => ErrorKind::ConnectFailure,
            ProbeError::Timeout { .. } => ErrorKind::Timeout,
            ProbeError::Handshake(_) => ErrorKind::HandshakeFailure,
            ProbeError::Protocol(_) => ErrorKind::ProtocolError,
            ProbeError::Subprocess(_) => ErrorKind::SubprocessFailure,
            ProbeError::Unsupported(_) => ErrorKind::Unsupported,
            ProbeError::Simulated => ErrorKind::SimulatedFailure,
        }
    }

    pub fn resolution(err: &(dyn std::error::Error + 'static)) -> Self {
        ProbeError::Resolution(report(err))
    }

    pub fn connect(err: &(dyn std::error::Error + 'static)) -> Self {
        ProbeError::Connect(report(err))
    }

    pub fn handshake(err: &(dyn std::error::Error + 'static)) -> Self {
        ProbeError::Handshake(report(err))
    }
}
