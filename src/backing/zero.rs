use crate::{ByteStream, Error, Result};
use std::io::SeekFrom;

/// A zero-filling source and discarding sink.
///
/// State is just a position counter and a length cap: reads yield zero bytes
/// up to the cap, writes advance the position and discard their input
/// (extending the cap when they run past it). Useful as a measuring sink or
/// as a source of blank data.
///
/// ```
/// use streamkit::{ByteStream, ZeroStream};
///
/// let mut zeros = ZeroStream::new(4);
/// let mut buf = [0xffu8; 8];
/// assert_eq!(zeros.read(&mut buf).unwrap(), 4);
/// assert_eq!(&buf[..4], &[0, 0, 0, 0]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct ZeroStream {
    pos: u64,
    len: u64,
}

impl ZeroStream {
    /// Create a zero stream with a length cap of `len` bytes.
    pub fn new(len: u64) -> Self {
        Self { pos: 0, len }
    }
}

impl ByteStream for ZeroStream {
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
        let remaining = self.len.saturating_sub(self.pos);
        let n = (buf.len() as u64).min(remaining) as usize;
        buf[..n].fill(0);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.pos += buf.len() as u64;
        if self.pos > self.len {
            self.len = self.pos;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => {
                self.pos = offset;
                return Ok(offset);
            }
            SeekFrom::Current(delta) => self.pos as i64 + delta,
            SeekFrom::End(delta) => self.len as i64 + delta,
        };
        if target < 0 {
            return Err(Error::InvalidArgument(format!(
                "cannot seek before the start of the stream (to {target})"
            )));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.pos)
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.len)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.len = len;
        if self.pos > len {
            self.pos = len;
        }
        Ok(())
    }
}
