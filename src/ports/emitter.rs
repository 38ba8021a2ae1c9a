use http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::http::Response;

/// Error type for response emission
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EmitterError {
    /// Error when writing to the transport fails
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error when a head is sent twice
    #[error("Response head already sent")]
    HeadAlreadySent,
}

/// Result type for emitter operations
pub type EmitterResult<T> = Result<T, EmitterError>;

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHead {
    pub version: String,
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn from_response(response: &Response) -> Self {
        Self {
            version: response.protocol_version().to_string(),
            status: response.status(),
            reason: response.reason_phrase().to_string(),
            headers: response.headers().clone(),
        }
    }
}

/// ResponseEmitter defines the port (interface) through which the App writes
/// a finished response to its transport
pub trait ResponseEmitter {
    /// Whether the status line and headers went out already
    fn headers_sent(&self) -> bool;

    /// Send the status line and headers
    fn send_head(&mut self, head: &ResponseHead) -> EmitterResult<()>;

    /// Send one body chunk
    fn write_chunk(&mut self, chunk: &[u8]) -> EmitterResult<()>;

    /// Whether the peer is still there. Emission stops once this is false.
    fn is_connected(&self) -> bool;
}
