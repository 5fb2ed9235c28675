use thiserror::Error;

/// Engine conditions callers are expected to match on.
///
/// Ordinary I/O and parse failures travel as `anyhow` errors with context;
/// the variants here carry semantics the CLI (or an embedding caller) must
/// distinguish rather than merely report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A computation was requested before enough data existed to answer it.
    /// Callers should render an explicit "no data" state, not blank output.
    #[error("insufficient context: {0}")]
    InsufficientContext(&'static str),
    /// The input exceeded the supported column cap.
    #[error("input has {found} column(s); at most {} are supported", crate::ingest::MAX_COLUMNS)]
    TooManyColumns { found: usize },
    /// The input carried no usable header row.
    #[error("input contains no columns")]
    EmptyInput,
}
