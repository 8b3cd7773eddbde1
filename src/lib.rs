use std::fmt::Debug;
use std::io::SeekFrom;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

pub use backing::file::FileStream;
pub use backing::memory::MemoryStream;
pub use backing::zero::ZeroStream;

pub use compose::multiplex::{ConcurrencyPolicy, MultiplexWriter, MultiplexWriterBuilder};
pub use compose::spill::{TierFactory, TieredSpillStream, TieredSpillStreamBuilder};

/// A specialized Result type for stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Chunk size used by the streaming copy helpers.
const COPY_CHUNK: usize = 64 * 1024;

/// Multiple failures collected during one fan-out operation.
///
/// Holds every underlying error in the order it was encountered, so a caller
/// can inspect each sink's failure individually.
///
/// ```
/// # use streamkit::{ByteStream, Error, MultiplexWriter};
/// # fn example(writer: &mut MultiplexWriter) {
/// match writer.write(b"data") {
///     Err(Error::Aggregate(agg)) => {
///         eprintln!("{} sinks failed", agg.len());
///         for error in agg.errors() {
///             eprintln!("  {error}");
///         }
///     }
///     _ => {}
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<Error>,
}

impl AggregateError {
    /// Number of collected failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true when no failures were collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The collected failures, in encounter order.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Consume the aggregate and take ownership of the failures.
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stream failures", self.errors.len())?;
        if let Some(first) = self.errors.first() {
            write!(f, " (first: {first})")?;
        }
        Ok(())
    }
}

/// A unified Error type for stream operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("IO Error")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Stream is unusable after a failed tier migration")]
    Poisoned,

    #[error("Generic stream error: {0}")]
    Generic(String),

    #[error("{0}")]
    Aggregate(AggregateError),
}

/// Accumulates zero, one, or many errors across a fan-out operation.
///
/// [`finish`](Self::finish) returns `Ok(())` when nothing was recorded, the
/// single error unchanged when exactly one was recorded, and
/// [`Error::Aggregate`] wrapping the full ordered set otherwise. A single
/// failure is never wrapped, so its identity survives intact.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<Error>,
}

impl ErrorCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure.
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Returns true when no failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Raise the recorded failures, if any.
    pub fn finish(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.pop().expect("length checked")),
            _ => Err(Error::Aggregate(AggregateError {
                errors: self.errors,
            })),
        }
    }
}

/// Stream modules.
pub mod backing {
    pub mod file;
    pub mod memory;
    pub mod zero;
}

pub mod compose;

/// The core byte-stream trait.
///
/// A `ByteStream` is a positioned sequence of bytes with synchronous
/// operations plus suspendable duals of the data-path operations. The
/// suspendable variants return [`BoxFuture`] so the trait stays object-safe;
/// the wrappers in [`compose`] own their inner streams as
/// `Box<dyn ByteStream>`.
///
/// The provided defaults for the suspendable methods check the cancellation
/// token and then run the synchronous body. Backing stores whose operations
/// never block for long (memory, local temp files) keep the defaults;
/// wrappers with genuine concurrency override them.
///
/// ## Capability flags
///
/// Implementations advertise what they support via `can_read` / `can_write` /
/// `can_seek` / `can_timeout`. Invoking an unsupported operation fails with
/// [`Error::Unsupported`]; it is never silently ignored.
///
/// ## Disposal
///
/// Cleanup happens in `Drop`. Dropping is idempotent and must never panic;
/// fallible cleanup suppresses the failure with a `tracing::warn!`.
pub trait ByteStream: Send + Debug {
    /// Whether this stream supports reading.
    fn can_read(&self) -> bool;

    /// Whether this stream supports writing.
    fn can_write(&self) -> bool;

    /// Whether this stream supports seeking and length queries.
    fn can_seek(&self) -> bool;

    /// Whether this stream supports read/write timeouts.
    fn can_timeout(&self) -> bool {
        false
    }

    /// Read up to `buf.len()` bytes into `buf`, returning the number of bytes
    /// read. Returns `Ok(0)` at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read a single byte, or `None` at end of stream.
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Write the whole of `buf` to the stream.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Write a single byte.
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    /// Flush buffered data to the underlying store.
    fn flush(&mut self) -> Result<()>;

    /// Reposition the stream, returning the new position from the start.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Current position from the start of the stream.
    fn position(&mut self) -> Result<u64>;

    /// Set the position from the start of the stream.
    fn set_position(&mut self, pos: u64) -> Result<()> {
        self.seek(SeekFrom::Start(pos)).map(|_| ())
    }

    /// Total length of the stream in bytes.
    fn len(&mut self) -> Result<u64>;

    /// Truncate or extend the stream to `len` bytes.
    fn set_len(&mut self, len: u64) -> Result<()>;

    /// The configured read timeout.
    fn read_timeout(&self) -> Result<Duration> {
        Err(Error::Unsupported("this stream does not support timeouts"))
    }

    /// Configure the read timeout.
    fn set_read_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Err(Error::Unsupported("this stream does not support timeouts"))
    }

    /// The configured write timeout.
    fn write_timeout(&self) -> Result<Duration> {
        Err(Error::Unsupported("this stream does not support timeouts"))
    }

    /// Configure the write timeout.
    fn set_write_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Err(Error::Unsupported("this stream does not support timeouts"))
    }

    /// Suspendable variant of [`read`](Self::read).
    fn read_async<'a>(
        &'a mut self,
        buf: &'a mut [u8],
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<usize>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.read(buf)
        })
    }

    /// Suspendable variant of [`write`](Self::write).
    fn write_async<'a>(
        &'a mut self,
        buf: &'a [u8],
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.write(buf)
        })
    }

    /// Suspendable variant of [`write_byte`](Self::write_byte).
    fn write_byte_async<'a>(
        &'a mut self,
        byte: u8,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.write_byte(byte)
        })
    }

    /// Suspendable variant of [`flush`](Self::flush).
    fn flush_async<'a>(&'a mut self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.flush()
        })
    }
}

/// Convenience methods built on [`ByteStream`].
pub trait ByteStreamExt: ByteStream {
    /// Seek back to the start of the stream.
    fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Read from the current position to the end of the stream.
    fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = vec![0u8; COPY_CHUNK];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }

    /// Copy from the current position to the end of this stream into `dest`,
    /// returning the number of bytes copied.
    ///
    /// The copy streams in fixed-size chunks, so it works for streams larger
    /// than available memory.
    ///
    /// ```
    /// use streamkit::{ByteStream, ByteStreamExt, MemoryStream};
    ///
    /// let mut source = MemoryStream::from_vec(b"hello".to_vec());
    /// let mut dest = MemoryStream::new();
    ///
    /// let copied = source.copy_to(&mut dest).unwrap();
    /// assert_eq!(copied, 5);
    /// ```
    fn copy_to(&mut self, dest: &mut dyn ByteStream) -> Result<u64> {
        let mut chunk = vec![0u8; COPY_CHUNK];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            dest.write(&chunk[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Suspendable variant of [`copy_to`](Self::copy_to).
    ///
    /// Cancellation is checked before every chunk.
    fn copy_to_async<'a>(
        &'a mut self,
        dest: &'a mut dyn ByteStream,
        cancel: &'a CancellationToken,
    ) -> impl std::future::Future<Output = Result<u64>> + Send + 'a {
        async move {
            let mut chunk = vec![0u8; COPY_CHUNK];
            let mut total = 0u64;
            loop {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let n = self.read_async(&mut chunk, cancel).await?;
                if n == 0 {
                    break;
                }
                dest.write_async(&chunk[..n], cancel).await?;
                total += n as u64;
            }
            Ok(total)
        }
    }
}

impl<T: ByteStream + ?Sized> ByteStreamExt for T {}
