use bytes::{Bytes, BytesMut};
use http::StatusCode;

use crate::ports::emitter::{EmitterError, EmitterResult, ResponseEmitter, ResponseHead};

/// Collects an emitted response in memory, for hosts that hand the result
/// to another HTTP stack.
#[derive(Debug, Default)]
pub struct BufferedEmitter {
    head: Option<ResponseHead>,
    body: BytesMut,
    chunks: Vec<usize>,
    disconnect_after: Option<usize>,
}

impl BufferedEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the peer as gone once `chunks` chunks were written.
    pub fn disconnect_after(chunks: usize) -> Self {
        Self {
            disconnect_after: Some(chunks),
            ..Self::default()
        }
    }

    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sizes of the chunks written, in order.
    pub fn chunk_sizes(&self) -> &[usize] {
        &self.chunks
    }

    /// Convert into an `http` response. A missing head becomes an empty 200.
    pub fn into_http_response(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body.freeze());
        if let Some(head) = self.head {
            *response.status_mut() = head.status;
            *response.headers_mut() = head.headers;
        } else {
            *response.status_mut() = StatusCode::OK;
        }
        response
    }
}

impl ResponseEmitter for BufferedEmitter {
    fn headers_sent(&self) -> bool {
        self.head.is_some()
    }

    fn send_head(&mut self, head: &ResponseHead) -> EmitterResult<()> {
        if self.head.is_some() {
            return Err(EmitterError::HeadAlreadySent);
        }
        self.head = Some(head.clone());
        Ok(())
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> EmitterResult<()> {
        self.body.extend_from_slice(chunk);
        self.chunks.push(chunk.len());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.disconnect_after
            .is_none_or(|limit| self.chunks.len() < limit)
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, header};

    use super::*;
    use crate::http::Response;

    #[test]
    fn test_into_http_response() {
        let response = Response::new()
            .with_status(StatusCode::CREATED)
            .with_header(header::LOCATION, HeaderValue::from_static("/items/1"));
        let mut emitter = BufferedEmitter::new();
        emitter.send_head(&ResponseHead::from_response(&response)).unwrap();
        emitter.write_chunk(b"created").unwrap();

        let http_response = emitter.into_http_response();
        assert_eq!(http_response.status(), StatusCode::CREATED);
        assert_eq!(http_response.headers()[header::LOCATION], "/items/1");
        assert_eq!(http_response.body().as_ref(), b"created");
    }

    #[test]
    fn test_disconnect_after() {
        let mut emitter = BufferedEmitter::disconnect_after(1);
        assert!(emitter.is_connected());
        emitter.write_chunk(b"a").unwrap();
        assert!(!emitter.is_connected());
    }
}
