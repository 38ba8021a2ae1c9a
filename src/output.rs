//! Direct program output and scoped capture of it.
//!
//! Handlers may print with [`echo`] (or the [`echo!`](crate::echo) macro)
//! instead of writing to the response. Outside a capture the text goes
//! straight to stdout; inside an [`OutputCapture`] it is buffered so the
//! route can merge it into the response body. Captures nest as a
//! thread-local stack and are released when the guard drops, whichever way
//! the scope is left.
use std::{
    cell::RefCell,
    io::{self, Write},
    marker::PhantomData,
};

thread_local! {
    static CAPTURES: RefCell<Vec<Vec<u8>>> = const { RefCell::new(Vec::new()) };
}

/// Write `text` to the innermost active capture, or to stdout.
pub fn echo(text: impl AsRef<str>) {
    let text = text.as_ref();
    let captured = CAPTURES.with(|captures| match captures.borrow_mut().last_mut() {
        Some(buffer) => {
            buffer.extend_from_slice(text.as_bytes());
            true
        }
        None => false,
    });

    if !captured {
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            tracing::warn!("Failed to write program output: {}", e);
        }
    }
}

/// Number of bytes held by the innermost active capture.
pub fn buffered_len() -> usize {
    CAPTURES.with(|captures| captures.borrow().last().map_or(0, Vec::len))
}

/// Number of active captures on this thread.
pub fn depth() -> usize {
    CAPTURES.with(|captures| captures.borrow().len())
}

/// Guard for one level of output capture.
#[derive(Debug)]
pub struct OutputCapture {
    level: usize,
    finished: bool,
    // Captures are tied to the thread that started them.
    _not_send: PhantomData<*const ()>,
}

impl OutputCapture {
    /// Start capturing.
    pub fn start() -> Self {
        let level = CAPTURES.with(|captures| {
            let mut captures = captures.borrow_mut();
            captures.push(Vec::new());
            captures.len()
        });
        Self {
            level,
            finished: false,
            _not_send: PhantomData,
        }
    }

    /// Stop capturing and return what was captured.
    pub fn finish(mut self) -> String {
        self.finished = true;
        String::from_utf8_lossy(&release(self.level)).into_owned()
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        if !self.finished {
            let discarded = release(self.level);
            if !discarded.is_empty() {
                tracing::debug!("Discarded {} bytes of captured output", discarded.len());
            }
        }
    }
}

/// Pop captures down to and including `level`, returning that level's data.
/// Inner captures that were leaked are folded into the returned data.
fn release(level: usize) -> Vec<u8> {
    CAPTURES.with(|captures| {
        let mut captures = captures.borrow_mut();
        if captures.len() < level {
            return Vec::new();
        }
        let inner: Vec<u8> = captures.drain(level..).flatten().collect();
        let mut data = captures.pop().unwrap_or_default();
        data.extend(inner);
        data
    })
}

/// Print formatted text through [`echo`].
#[macro_export]
macro_rules! echo {
    ($($arg:tt)*) => {
        $crate::output::echo(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_collects_echo() {
        let capture = OutputCapture::start();
        echo("foo");
        crate::echo!("{}{}", "b", "ar");
        assert_eq!(buffered_len(), 6);
        assert_eq!(capture.finish(), "foobar");
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_dropped_capture_is_discarded() {
        {
            let _capture = OutputCapture::start();
            echo("lost");
            assert_eq!(depth(), 1);
        }
        assert_eq!(depth(), 0);
        assert_eq!(buffered_len(), 0);
    }

    #[test]
    fn test_nested_captures() {
        let outer = OutputCapture::start();
        echo("a");
        let inner = OutputCapture::start();
        echo("b");
        assert_eq!(inner.finish(), "b");
        echo("c");
        assert_eq!(outer.finish(), "ac");
    }
}
