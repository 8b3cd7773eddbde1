use crate::{ByteStream, Error, ErrorCollector, Result};
use futures::future::{BoxFuture, join_all};
use std::fmt;
use std::io::SeekFrom;
use std::sync::Mutex;
use std::thread;
use tokio_util::sync::CancellationToken;

/// Concurrency policy for fan-out operations.
///
/// The policies differ not only in scheduling but in failure semantics, and
/// the synchronous and suspendable paths of the same policy diverge
/// deliberately; see the method docs on [`MultiplexWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// Synchronous calls visit sinks in order and keep going past failures;
    /// suspendable calls run all sinks concurrently, await every one, and
    /// surface the first failure in declared order.
    #[default]
    Default,

    /// Every sink's operation runs on its own unit of execution, even from
    /// the synchronous entry points.
    ForceParallel,

    /// Sinks are visited strictly in declared order, one at a time.
    ForceSerial,
}

/// Replicates every write to a fixed set of sink streams.
///
/// The sink set is validated once at construction and never changes. All
/// mutating operations (write, single-byte write, flush) fan out to every
/// sink under the active [`ConcurrencyPolicy`]; reading, seeking, and length
/// queries are unsupported.
///
/// Dropping the writer drops every sink exactly once; per-sink cleanup
/// failures are each sink's responsibility to suppress.
///
/// ```
/// use streamkit::{ByteStream, MemoryStream, MultiplexWriter};
///
/// let first = MemoryStream::new();
/// let second = MemoryStream::new();
/// let (a, b) = (first.clone(), second.clone());
///
/// let mut writer = MultiplexWriter::builder()
///     .add_sink(first)
///     .add_sink(second)
///     .build()
///     .unwrap();
///
/// writer.write(b"data").unwrap();
/// assert_eq!(a.contents(), b"data");
/// assert_eq!(b.contents(), b"data");
/// ```
#[derive(Debug)]
pub struct MultiplexWriter {
    sinks: Vec<Box<dyn ByteStream>>,
    policy: ConcurrencyPolicy,
}

/// A single fan-out operation, applied to each sink per the active policy.
enum WriteOp<'o> {
    Write(&'o [u8]),
    WriteByte(u8),
    Flush,
}

impl WriteOp<'_> {
    fn apply(&self, sink: &mut dyn ByteStream) -> Result<()> {
        match *self {
            WriteOp::Write(buf) => sink.write(buf),
            WriteOp::WriteByte(byte) => sink.write_byte(byte),
            WriteOp::Flush => sink.flush(),
        }
    }

    fn apply_async<'a>(
        &'a self,
        sink: &'a mut dyn ByteStream,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        match *self {
            WriteOp::Write(buf) => sink.write_async(buf, cancel),
            WriteOp::WriteByte(byte) => sink.write_byte_async(byte, cancel),
            WriteOp::Flush => sink.flush_async(cancel),
        }
    }
}

impl MultiplexWriter {
    /// Create a builder for configuring a multiplexing writer.
    pub fn builder() -> MultiplexWriterBuilder {
        MultiplexWriterBuilder::new()
    }

    /// Create a multiplexing writer over `sinks` with the default policy.
    ///
    /// Fails with [`Error::InvalidArgument`] if any sink is not writable.
    pub fn new(sinks: Vec<Box<dyn ByteStream>>) -> Result<Self> {
        Self::with_policy(sinks, ConcurrencyPolicy::default())
    }

    /// Create a multiplexing writer over `sinks` with an explicit policy.
    ///
    /// Sink writability is checked here, once; write calls do not re-validate.
    pub fn with_policy(sinks: Vec<Box<dyn ByteStream>>, policy: ConcurrencyPolicy) -> Result<Self> {
        for (index, sink) in sinks.iter().enumerate() {
            if !sink.can_write() {
                return Err(Error::InvalidArgument(format!(
                    "sink {index} does not support writing"
                )));
            }
        }
        Ok(Self { sinks, policy })
    }

    /// Number of sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// The active concurrency policy.
    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Get a reference to a specific sink by index.
    pub fn sink(&self, index: usize) -> Option<&dyn ByteStream> {
        self.sinks.get(index).map(|sink| sink.as_ref())
    }

    /// Fan `op` out to every sink, synchronously.
    ///
    /// - `Default`: in declared order, continuing past failures; raises a
    ///   single error unchanged or an aggregate of all of them.
    /// - `ForceSerial`: in declared order, aborting on the first failure;
    ///   later sinks are not attempted.
    /// - `ForceParallel`: one scoped thread per sink; waits for all, then
    ///   raises only the first *completed* failure, unaggregated.
    fn fan_out(&mut self, op: WriteOp<'_>) -> Result<()> {
        match self.policy {
            ConcurrencyPolicy::ForceParallel => {
                // Failures land here in completion order.
                let failures = Mutex::new(Vec::new());
                thread::scope(|scope| {
                    for sink in self.sinks.iter_mut() {
                        let op = &op;
                        let failures = &failures;
                        scope.spawn(move || {
                            if let Err(e) = op.apply(sink.as_mut()) {
                                failures.lock().expect("poisoned lock").push(e);
                            }
                        });
                    }
                });

                let mut failures = failures.into_inner().expect("poisoned lock");
                if failures.is_empty() {
                    Ok(())
                } else {
                    tracing::warn!(
                        failed = failures.len(),
                        "Parallel fan-out failed, raising first completed failure"
                    );
                    Err(failures.remove(0))
                }
            }

            ConcurrencyPolicy::ForceSerial => {
                for sink in self.sinks.iter_mut() {
                    op.apply(sink.as_mut())?;
                }
                Ok(())
            }

            ConcurrencyPolicy::Default => {
                let mut collector = ErrorCollector::new();
                for (index, sink) in self.sinks.iter_mut().enumerate() {
                    if let Err(e) = op.apply(sink.as_mut()) {
                        tracing::warn!(
                            sink_index = index,
                            error = ?e,
                            "Sink operation failed, continuing with remaining sinks"
                        );
                        collector.push(e);
                    }
                }
                collector.finish()
            }
        }
    }

    /// Fan `op` out to every sink, suspendably.
    ///
    /// - `Default`: all sinks issued concurrently and awaited to completion;
    ///   the first failure in declared order propagates unaggregated.
    /// - `ForceSerial`: awaited strictly in order, continuing past failures,
    ///   aggregating all of them (unlike the synchronous path, which aborts).
    /// - `ForceParallel`: all sinks dispatched, all awaited, all failures
    ///   aggregated (unlike the synchronous path, which surfaces one).
    async fn fan_out_async(
        &mut self,
        op: WriteOp<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.policy {
            ConcurrencyPolicy::ForceParallel => {
                let writes: Vec<_> = self
                    .sinks
                    .iter_mut()
                    .map(|sink| op.apply_async(sink.as_mut(), cancel))
                    .collect();
                let results = join_all(writes).await;

                let mut collector = ErrorCollector::new();
                for (index, result) in results.into_iter().enumerate() {
                    if let Err(e) = result {
                        tracing::warn!(sink_index = index, error = ?e, "Sink operation failed");
                        collector.push(e);
                    }
                }
                collector.finish()
            }

            ConcurrencyPolicy::ForceSerial => {
                let mut collector = ErrorCollector::new();
                for (index, sink) in self.sinks.iter_mut().enumerate() {
                    if let Err(e) = op.apply_async(sink.as_mut(), cancel).await {
                        tracing::warn!(
                            sink_index = index,
                            error = ?e,
                            "Sink operation failed, continuing with remaining sinks"
                        );
                        collector.push(e);
                    }
                }
                collector.finish()
            }

            ConcurrencyPolicy::Default => {
                let writes: Vec<_> = self
                    .sinks
                    .iter_mut()
                    .map(|sink| op.apply_async(sink.as_mut(), cancel))
                    .collect();
                // Every sink runs to completion before any failure is raised.
                let results = join_all(writes).await;
                for result in results {
                    result?;
                }
                Ok(())
            }
        }
    }
}

impl ByteStream for MultiplexWriter {
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
        Err(Error::Unsupported("MultiplexWriter does not support reading"))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.fan_out(WriteOp::Write(buf))
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.fan_out(WriteOp::WriteByte(byte))
    }

    fn flush(&mut self) -> Result<()> {
        self.fan_out(WriteOp::Flush)
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(Error::Unsupported("MultiplexWriter does not support seeking"))
    }

    fn position(&mut self) -> Result<u64> {
        Err(Error::Unsupported(
            "MultiplexWriter does not support position queries",
        ))
    }

    fn len(&mut self) -> Result<u64> {
        Err(Error::Unsupported(
            "MultiplexWriter does not support length queries",
        ))
    }

    fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(Error::Unsupported(
            "MultiplexWriter does not support length queries",
        ))
    }

    fn write_async<'a>(
        &'a mut self,
        buf: &'a [u8],
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.fan_out_async(WriteOp::Write(buf), cancel))
    }

    fn write_byte_async<'a>(
        &'a mut self,
        byte: u8,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.fan_out_async(WriteOp::WriteByte(byte), cancel))
    }

    fn flush_async<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.fan_out_async(WriteOp::Flush, cancel))
    }
}

/// Builder for [`MultiplexWriter`].
pub struct MultiplexWriterBuilder {
    sinks: Vec<Box<dyn ByteStream>>,
    force_parallel: bool,
    force_serial: bool,
}

impl MultiplexWriterBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            force_parallel: false,
            force_serial: false,
        }
    }

    /// Add a sink to the fan-out set.
    pub fn add_sink(mut self, sink: impl ByteStream + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Add an already-boxed sink to the fan-out set.
    pub fn add_boxed_sink(mut self, sink: Box<dyn ByteStream>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Force every sink operation onto its own unit of execution.
    pub fn force_parallel(mut self, enabled: bool) -> Self {
        self.force_parallel = enabled;
        self
    }

    /// Force strictly serial, in-order sink operations.
    pub fn force_serial(mut self, enabled: bool) -> Self {
        self.force_serial = enabled;
        self
    }

    /// Build the writer.
    ///
    /// Fails with [`Error::InvalidArgument`] if both `force_parallel` and
    /// `force_serial` are set, or if any sink is not writable. No write is
    /// ever attempted on an invalid configuration.
    pub fn build(self) -> Result<MultiplexWriter> {
        let policy = match (self.force_parallel, self.force_serial) {
            (true, true) => {
                return Err(Error::InvalidArgument(
                    "force_parallel and force_serial are mutually exclusive".to_string(),
                ));
            }
            (true, false) => ConcurrencyPolicy::ForceParallel,
            (false, true) => ConcurrencyPolicy::ForceSerial,
            (false, false) => ConcurrencyPolicy::Default,
        };
        MultiplexWriter::with_policy(self.sinks, policy)
    }
}

impl Default for MultiplexWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MultiplexWriterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplexWriterBuilder")
            .field("sink_count", &self.sinks.len())
            .field("force_parallel", &self.force_parallel)
            .field("force_serial", &self.force_serial)
            .finish()
    }
}
