/// Error taxonomy for the session engine.
///
/// Fatal to forward progress:
///   - `ProvisioningError`: session stays in `Loading`, surfaced verbatim.
///   - `ConfigError`      : malformed configuration, rejected at construction.
///
/// Absorbed / reported:
///   - `SessionError::AlreadyFinished`: benign no-op signal.
///   - `LogFlushError` : reported to the host, never blocks the results view.
///   - `GridFetchError`: reveal falls back to `base = 0`.
///
/// A submitted answer that fails to parse is NOT an error: it scores as wrong.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("provisioning failed: {0}")]
    Network(String),
    #[error("provisioning returned no exercises")]
    EmptyExerciseList,
    #[error("provisioning returned no session identifier")]
    MissingSessionId,
}

/// Malformed destabilization / reveal configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a probability in [0, 1], got {value}")]
    Probability { field: &'static str, value: f64 },
    #[error("{field} range is inverted: min {min} > max {max}")]
    DurationRange { field: &'static str, min: u32, max: u32 },
    #[error("{field} minimum duration must be at least 1 exercise")]
    ZeroDuration { field: &'static str },
    #[error("reveal.{field} {reason}")]
    InvalidReveal { field: &'static str, reason: &'static str },
    #[error("session.volume must be at least 1")]
    ZeroVolume,
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("session already finished")]
    AlreadyFinished,
    #[error("session has not started")]
    NotStarted,
    #[error("session is still in progress")]
    NotFinished,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogFlushError {
    #[error("observation sink rejected the batch: {0}")]
    Sink(String),
    #[error("observations were already flushed for this session")]
    AlreadyFlushed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("grid state unavailable: {0}")]
pub struct GridFetchError(pub String);
