//! In-memory message body with stream semantics.
//!
//! The body keeps a read cursor separate from the write position: writes
//! always append, reads start wherever the cursor was left. This is enough to
//! model the read / write / seek / eof / size contract that the response
//! emitter and the output buffering modes depend on.
use std::fmt;

use bytes::{Bytes, BytesMut};

#[derive(Clone)]
pub struct Body {
    buf: BytesMut,
    pos: usize,
    writable: bool,
    seekable: bool,
    sized: bool,
}

impl Body {
    /// Empty, writable, seekable body.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            pos: 0,
            writable: true,
            seekable: true,
            sized: true,
        }
    }

    /// Body that rejects writes.
    pub fn read_only(data: impl Into<Bytes>) -> Self {
        Self {
            writable: false,
            ..Self::from(data.into())
        }
    }

    /// Body whose total size is not known up front, like a pipe.
    pub fn unknown_size(data: impl Into<Bytes>) -> Self {
        Self {
            sized: false,
            seekable: false,
            ..Self::from(data.into())
        }
    }

    /// Append `data`. Returns the number of bytes written, zero when the
    /// body is read-only.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> usize {
        if !self.writable {
            return 0;
        }
        let data = data.as_ref();
        self.buf.extend_from_slice(data);
        data.len()
    }

    /// Read up to `len` bytes from the cursor.
    pub fn read(&mut self, len: usize) -> Bytes {
        let end = self.pos.saturating_add(len).min(self.buf.len());
        let chunk = Bytes::copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        chunk
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Move the cursor to the start. No-op for non-seekable bodies.
    pub fn rewind(&mut self) {
        self.seek(0);
    }

    pub fn seek(&mut self, pos: usize) {
        if self.seekable {
            self.pos = pos.min(self.buf.len());
        }
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Total size in bytes, `None` when unknown.
    pub fn size(&self) -> Option<usize> {
        self.sized.then_some(self.buf.len())
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Entire content regardless of the cursor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Entire content as (lossy) UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        let mut body = Self::new();
        body.buf.extend_from_slice(&data);
        body
    }
}

impl From<&str> for Body {
    fn from(data: &str) -> Self {
        Self::from(Bytes::copy_from_slice(data.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(data: String) -> Self {
        Self::from(Bytes::from(data))
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.contents())
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("len", &self.buf.len())
            .field("pos", &self.pos)
            .field("writable", &self.writable)
            .field("seekable", &self.seekable)
            .field("sized", &self.sized)
            .finish()
    }
}
