use crate::{ByteStream, Error, Result};
use std::fmt;
use std::io::SeekFrom;
use std::sync::{Arc, Mutex};

/// A growable in-memory `ByteStream`.
///
/// - Data lives in a `Vec<u8>` behind a shared handle; cloning the stream
///   clones the handle, not the bytes.
/// - Writing past the end extends the buffer; seeking past the end and then
///   writing zero-fills the gap.
/// - The default first tier of a [`TieredSpillStream`](crate::TieredSpillStream),
///   and handy for tests and ephemeral usage.
#[derive(Clone, Default)]
pub struct MemoryStream {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: Vec<u8>,
    pos: u64,
}

impl MemoryStream {
    /// Create a new empty in-memory stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory stream over existing bytes, positioned at the start.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { data, pos: 0 })),
        }
    }

    /// Get a copy of the stored bytes (useful for tests).
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().expect("poisoned lock").data.clone()
    }
}

impl fmt::Debug for MemoryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Avoid dumping potentially large in-memory contents.
        let inner = self.inner.lock().expect("poisoned lock");
        f.debug_struct("MemoryStream")
            .field("len", &inner.data.len())
            .field("pos", &inner.pos)
            .finish()
    }
}

impl ByteStream for MemoryStream {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock().expect("poisoned lock");
        let pos = inner.pos.min(inner.data.len() as u64) as usize;
        let available = inner.data.len() - pos;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&inner.data[pos..pos + n]);
        inner.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().expect("poisoned lock");
        let pos = inner.pos as usize;
        let end = pos + buf.len();
        if inner.data.len() < end {
            // Covers both appends and gaps left by seeking past the end.
            inner.data.resize(end, 0);
        }
        inner.data[pos..end].copy_from_slice(buf);
        inner.pos = end as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let mut inner = self.inner.lock().expect("poisoned lock");
        let base = match pos {
            SeekFrom::Start(offset) => {
                inner.pos = offset;
                return Ok(offset);
            }
            SeekFrom::Current(delta) => inner.pos as i64 + delta,
            SeekFrom::End(delta) => inner.data.len() as i64 + delta,
        };
        if base < 0 {
            return Err(Error::InvalidArgument(format!(
                "cannot seek before the start of the stream (to {base})"
            )));
        }
        inner.pos = base as u64;
        Ok(inner.pos)
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.inner.lock().expect("poisoned lock").pos)
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.inner.lock().expect("poisoned lock").data.len() as u64)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        let mut inner = self.inner.lock().expect("poisoned lock");
        inner.data.resize(len as usize, 0);
        if inner.pos > len {
            inner.pos = len;
        }
        Ok(())
    }
}
