use thiserror::Error;

/// Errors returned by the reservation store and the activity log.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Propagated from the SQLite pool.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded migrations failed to apply.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be decoded into its record type.
    #[error("malformed record {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored timestamp did not parse as RFC 3339.
    #[error("malformed timestamp {raw:?}: {source}")]
    Timestamp {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A record could not be encoded for storage.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Terminal failure reasons for a single capture task.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Connection failure or transport error while talking to the audio source.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The audio source answered with something other than 200.
    #[error("Status Code={0}")]
    Status(u16),

    /// Creating, writing or renaming the artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source closed the stream before the window ended.
    #[error("stream ended before the recording window closed")]
    StreamEnded,

    /// No chunk arrived within the configured read timeout.
    #[error("no data received for {0:?}")]
    ReadTimeout(std::time::Duration),

    /// The publisher exited unsuccessfully; `output` is its combined stdout/stderr.
    #[error("publisher exited with {status}: {output}")]
    Publish { status: String, output: String },

    /// The capture task panicked.
    #[error("capture task panicked: {0}")]
    Panicked(String),
}
