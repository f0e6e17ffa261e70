//! Byte sinks and sources the trace stream is written to and read from.

use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::Arc;

pub trait ByteSink {
    /// Writes all of `bytes` or fails.
    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub trait ByteSource {
    /// Fills `buf` completely unless the stream ends first; returns the number of bytes read.
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl ByteSink for Vec<u8> {
    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl ByteSource for &[u8] {
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.len());
        let (head, tail) = self.split_at(n);
        buf[..n].copy_from_slice(head);
        *self = tail;
        Ok(n)
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_raw(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_raw(buf)
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Adapts any `std::io` reader or writer (files, pipes, sockets) to the stream traits.
///
/// Writes retry transient failures up to `retries` times before giving up.
#[derive(Debug)]
pub struct FileLike<T> {
    inner: T,
    retries: u32,
}

impl<T> FileLike<T> {
    pub fn new(inner: T, retries: u32) -> Self {
        Self { inner, retries }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Write> ByteSink for FileLike<T> {
    fn write_raw(&mut self, mut bytes: &[u8]) -> io::Result<()> {
        let mut failures = 0u32;
        while !bytes.is_empty() {
            match self.inner.write(bytes) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "sink accepted no bytes",
                    ));
                }
                Ok(n) => bytes = &bytes[n..],
                Err(err) if is_transient(&err) && failures < self.retries => {
                    failures += 1;
                    tracing::debug!(%err, failures, "retrying trace write");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T: Read> ByteSource for FileLike<T> {
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }
}

/// A sink shared between threads; each write holds the lock, so packets never interleave.
#[derive(Debug)]
pub struct SharedSink<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> SharedSink<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Runs `f` with the sink locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ByteSink> ByteSink for SharedSink<S> {
    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.lock().write_raw(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}
