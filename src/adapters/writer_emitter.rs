use std::io::{ErrorKind, Write};

use crate::ports::emitter::{EmitterError, EmitterResult, ResponseEmitter, ResponseHead};

/// Emits a raw HTTP/1.x response onto any writer (stdout, a socket, a
/// buffer). A broken pipe marks the peer as gone instead of failing.
#[derive(Debug)]
pub struct WriterEmitter<W: Write> {
    writer: W,
    head_sent: bool,
    connected: bool,
}

impl<W: Write> WriterEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            head_sent: false,
            connected: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_all(&mut self, data: &[u8]) -> EmitterResult<()> {
        match self.writer.write_all(data).and_then(|()| self.writer.flush()) {
            Ok(()) => Ok(()),
            Err(e) if matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset) => {
                tracing::debug!("Client went away while emitting: {}", e);
                self.connected = false;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<W: Write> ResponseEmitter for WriterEmitter<W> {
    fn headers_sent(&self) -> bool {
        self.head_sent
    }

    fn send_head(&mut self, head: &ResponseHead) -> EmitterResult<()> {
        if self.head_sent {
            return Err(EmitterError::HeadAlreadySent);
        }
        let mut raw = format!(
            "HTTP/{} {} {}\r\n",
            head.version,
            head.status.as_u16(),
            head.reason
        )
        .into_bytes();
        for (name, value) in &head.headers {
            raw.extend_from_slice(name.as_str().as_bytes());
            raw.extend_from_slice(b": ");
            raw.extend_from_slice(value.as_bytes());
            raw.extend_from_slice(b"\r\n");
        }
        raw.extend_from_slice(b"\r\n");

        self.head_sent = true;
        self.write_all(&raw)
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> EmitterResult<()> {
        self.write_all(chunk)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
