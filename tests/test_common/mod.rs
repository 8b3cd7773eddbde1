//! Shared stream fakes for the integration tests.
#![allow(dead_code)]

use std::io::SeekFrom;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use streamkit::{ByteStream, Error, MemoryStream, Result};
use tokio_util::sync::CancellationToken;

/// Shared operation log: `(sink id, operation name)` in call order.
pub type OpLog = Arc<Mutex<Vec<(usize, &'static str)>>>;

pub fn new_log() -> OpLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &OpLog) -> Vec<(usize, &'static str)> {
    log.lock().unwrap().clone()
}

/// A write-only sink that records every operation into a shared log and can
/// be configured to fail its writes.
#[derive(Debug)]
pub struct RecordingSink {
    id: usize,
    log: OpLog,
    fail_writes: bool,
}

impl RecordingSink {
    pub fn new(id: usize, log: OpLog) -> Self {
        Self {
            id,
            log,
            fail_writes: false,
        }
    }

    pub fn failing(id: usize, log: OpLog) -> Self {
        Self {
            id,
            log,
            fail_writes: true,
        }
    }
}

impl ByteStream for RecordingSink {
    fn can_read(&self) -> bool {
        false
    }

    fn can_write(&self) -> bool {
        true
    }

    fn can_seek(&self) -> bool {
        false
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::Unsupported("RecordingSink is write-only"))
    }

    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        self.log.lock().unwrap().push((self.id, "write"));
        if self.fail_writes {
            Err(Error::Generic(format!("sink {} failed", self.id)))
        } else {
            Ok(())
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.log.lock().unwrap().push((self.id, "flush"));
        Ok(())
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(Error::Unsupported("RecordingSink is not seekable"))
    }

    fn position(&mut self) -> Result<u64> {
        Err(Error::Unsupported("RecordingSink is not seekable"))
    }

    fn len(&mut self) -> Result<u64> {
        Err(Error::Unsupported("RecordingSink is not seekable"))
    }

    fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(Error::Unsupported("RecordingSink is not seekable"))
    }
}

/// A write-only sink whose suspendable write yields once before landing,
/// so concurrent fan-outs that abandon in-flight sinks lose its write.
#[derive(Debug)]
pub struct SlowSink {
    id: usize,
    log: OpLog,
}

impl SlowSink {
    pub fn new(id: usize, log: OpLog) -> Self {
        Self { id, log }
    }
}

impl ByteStream for SlowSink {
    fn can_read(&self) -> bool {
        false
    }

    fn can_write(&self) -> bool {
        true
    }

    fn can_seek(&self) -> bool {
        false
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::Unsupported("SlowSink is write-only"))
    }

    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        self.log.lock().unwrap().push((self.id, "write"));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.log.lock().unwrap().push((self.id, "flush"));
        Ok(())
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(Error::Unsupported("SlowSink is not seekable"))
    }

    fn position(&mut self) -> Result<u64> {
        Err(Error::Unsupported("SlowSink is not seekable"))
    }

    fn len(&mut self) -> Result<u64> {
        Err(Error::Unsupported("SlowSink is not seekable"))
    }

    fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(Error::Unsupported("SlowSink is not seekable"))
    }

    fn write_async<'a>(
        &'a mut self,
        buf: &'a [u8],
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.write(buf)
        })
    }
}

/// A stream that refuses writes; used to exercise construction validation.
#[derive(Debug, Default)]
pub struct ReadOnlyStream {
    inner: MemoryStream,
}

impl ReadOnlyStream {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStream for ReadOnlyStream {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        false
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        Err(Error::Unsupported("stream is read-only"))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.inner.seek(pos)
    }

    fn position(&mut self) -> Result<u64> {
        self.inner.position()
    }

    fn len(&mut self) -> Result<u64> {
        self.inner.len()
    }

    fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(Error::Unsupported("stream is read-only"))
    }
}

/// An in-memory stream that additionally supports read/write timeouts.
#[derive(Debug, Default)]
pub struct TimeoutStream {
    inner: MemoryStream,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl TimeoutStream {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStream for TimeoutStream {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn can_timeout(&self) -> bool {
        true
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.inner.seek(pos)
    }

    fn position(&mut self) -> Result<u64> {
        self.inner.position()
    }

    fn len(&mut self) -> Result<u64> {
        self.inner.len()
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.inner.set_len(len)
    }

    fn read_timeout(&self) -> Result<Duration> {
        Ok(self.read_timeout)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn write_timeout(&self) -> Result<Duration> {
        Ok(self.write_timeout)
    }

    fn set_write_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.write_timeout = timeout;
        Ok(())
    }
}
