use thiserror::Error;

/// Errors surfaced by the capture/sync engine.
///
/// Only initialization problems and sink failures ever reach the caller as
/// errors. Backpressure drops, duplicated frames, and rejected timestamps are
/// absorbed where they happen and exposed through statistics counters.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("initialization error: {0}")]
    InitializationError(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("audio engine error: {0}")]
    AudioError(String),
    #[error("video engine error: {0}")]
    VideoError(String),
    #[error("muxing error: {0}")]
    MuxingError(String),
    #[error("sink error: {0}")]
    SinkError(String),
}
