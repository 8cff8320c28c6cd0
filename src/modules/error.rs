//! Error type shared by the transport, config and state-file layers.
//!
//! Decision making itself never fails: a missing move or a malformed
//! snapshot field is handled in place. Only I/O at the edges surfaces here.

/// Failures at the edges of a tick.
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("api returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The server answered 2xx but flagged the request as unsuccessful.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// A JSON payload could not be encoded or decoded.
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A command-line or file setting is unusable.
    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SwarmError>;
