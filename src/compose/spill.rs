use crate::backing::file::FileStream;
use crate::backing::memory::MemoryStream;
use crate::{ByteStream, ByteStreamExt, Error, Result};
use futures::future::BoxFuture;
use std::fmt;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Produces the second-tier backing store, lazily and at most once.
pub type TierFactory = Box<dyn FnMut() -> Result<Box<dyn ByteStream>> + Send>;

/// A stream that starts in a fast, size-limited store and spills to a larger
/// one exactly once.
///
/// While the write position stays at or below the configured limit, all
/// operations delegate to the first-tier store (an in-memory stream by
/// default). The first write that would push past the limit first migrates
/// every byte, the position, and any timeout settings to a second-tier store
/// produced by the tier factory (an anonymous self-deleting temp file by
/// default), then lands on it. Migration never reverses.
///
/// A failed migration disposes both stores and leaves the stream permanently
/// unusable: every subsequent operation fails with [`Error::Poisoned`].
/// Concurrent calls from multiple owners are not defended against; the
/// stream expects a single caller at a time.
///
/// ```
/// use streamkit::{ByteStream, TieredSpillStream};
///
/// let mut stream = TieredSpillStream::new(16);
/// stream.write(&[0u8; 16]).unwrap();
/// assert!(!stream.is_on_large_store());
///
/// // One byte past the limit triggers the spill.
/// stream.write_byte(0).unwrap();
/// assert!(stream.is_on_large_store());
/// ```
pub struct TieredSpillStream {
    /// The currently-in-use backing store. `None` only after a failed
    /// migration, in which case the stream is unusable.
    active: Option<Box<dyn ByteStream>>,
    limit: u64,
    /// Present exactly until migration happens; cleared at the commit point.
    tier_factory: Option<TierFactory>,
}

impl fmt::Debug for TieredSpillStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredSpillStream")
            .field("active", &self.active)
            .field("limit", &self.limit)
            .field("migrated", &self.tier_factory.is_none())
            .finish()
    }
}

fn default_tier_factory() -> TierFactory {
    Box::new(|| Ok(Box::new(FileStream::temp()?) as Box<dyn ByteStream>))
}

fn validate_store(store: &dyn ByteStream, role: &str) -> Result<()> {
    if store.can_read() && store.can_write() && store.can_seek() {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "{role} store must support reading, writing and seeking"
        )))
    }
}

impl TieredSpillStream {
    /// Create a spill stream with a fresh in-memory first tier and the
    /// default temp-file second-tier factory.
    pub fn new(limit: u64) -> Self {
        Self {
            active: Some(Box::new(MemoryStream::new())),
            limit,
            tier_factory: Some(default_tier_factory()),
        }
    }

    /// Create a builder for configuring the tiers explicitly.
    pub fn builder(limit: u64) -> TieredSpillStreamBuilder {
        TieredSpillStreamBuilder::new(limit)
    }

    /// The byte threshold beyond which writes spill to the second tier.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// True once the stream has migrated to the second-tier store.
    pub fn is_on_large_store(&self) -> bool {
        self.tier_factory.is_none()
    }

    /// Whether writing `additional` more bytes at the current position would
    /// require migrating to the second tier.
    ///
    /// Always false once migrated.
    pub fn needs_upgrade(&mut self, additional: u64) -> Result<bool> {
        if self.tier_factory.is_none() {
            return Ok(false);
        }
        let position = self.active()?.position()?;
        Ok(position
            .checked_add(additional)
            .is_none_or(|total| total > self.limit))
    }

    fn active(&mut self) -> Result<&mut dyn ByteStream> {
        match self.active.as_mut() {
            Some(store) => Ok(store.as_mut()),
            None => Err(Error::Poisoned),
        }
    }

    /// Migrate to the second-tier store now.
    ///
    /// No-op if already migrated. All bytes are streamed across, then the
    /// recorded position (and timeout settings, when both stores support
    /// them) is restored on the new store. The swap of the active store is
    /// the single commit point; on any failure before it, both stores are
    /// disposed and the stream is left permanently unusable.
    pub fn upgrade(&mut self) -> Result<()> {
        let Some(factory) = self.tier_factory.as_mut() else {
            return Ok(());
        };
        let mut old = match self.active.take() {
            Some(store) => store,
            None => return Err(Error::Poisoned),
        };
        tracing::debug!(limit = self.limit, "Migrating to second-tier store");

        let mut new = factory()?;
        validate_store(new.as_ref(), "second-tier")?;

        if old.can_timeout() && new.can_timeout() {
            new.set_read_timeout(old.read_timeout()?)?;
            new.set_write_timeout(old.write_timeout()?)?;
        }

        let position = old.position()?;
        old.rewind()?;
        let copied = old.copy_to(new.as_mut())?;
        new.set_position(position)?;

        let old_len = old.len()?;
        let new_len = new.len()?;
        if old_len != new_len {
            return Err(Error::Generic(format!(
                "tier copy length mismatch: first tier reports {old_len} bytes, second tier {new_len}"
            )));
        }

        // Single commit point; the first tier is disposed directly after.
        self.active = Some(new);
        self.tier_factory = None;
        tracing::info!(bytes = copied, "Migrated to second-tier store");
        Ok(())
    }

    /// Suspendable variant of [`upgrade`](Self::upgrade).
    ///
    /// Cancellation is checked at entry and before every copied chunk;
    /// cancelling mid-migration leaves the stream unusable, like any other
    /// migration failure.
    pub async fn upgrade_async(&mut self, cancel: &CancellationToken) -> Result<()> {
        let Some(factory) = self.tier_factory.as_mut() else {
            return Ok(());
        };
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut old = match self.active.take() {
            Some(store) => store,
            None => return Err(Error::Poisoned),
        };
        tracing::debug!(limit = self.limit, "Migrating to second-tier store");

        let mut new = factory()?;
        validate_store(new.as_ref(), "second-tier")?;

        if old.can_timeout() && new.can_timeout() {
            new.set_read_timeout(old.read_timeout()?)?;
            new.set_write_timeout(old.write_timeout()?)?;
        }

        let position = old.position()?;
        old.rewind()?;
        let copied = old.copy_to_async(new.as_mut(), cancel).await?;
        new.set_position(position)?;

        let old_len = old.len()?;
        let new_len = new.len()?;
        if old_len != new_len {
            return Err(Error::Generic(format!(
                "tier copy length mismatch: first tier reports {old_len} bytes, second tier {new_len}"
            )));
        }

        self.active = Some(new);
        self.tier_factory = None;
        tracing::info!(bytes = copied, "Migrated to second-tier store");
        Ok(())
    }
}

impl ByteStream for TieredSpillStream {
    fn can_read(&self) -> bool {
        self.active.as_ref().is_some_and(|store| store.can_read())
    }

    fn can_write(&self) -> bool {
        self.active.as_ref().is_some_and(|store| store.can_write())
    }

    fn can_seek(&self) -> bool {
        self.active.as_ref().is_some_and(|store| store.can_seek())
    }

    fn can_timeout(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|store| store.can_timeout())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.active()?.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.needs_upgrade(buf.len() as u64)? {
            self.upgrade()?;
        }
        self.active()?.write(buf)
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.needs_upgrade(1)? {
            self.upgrade()?;
        }
        self.active()?.write_byte(byte)
    }

    fn flush(&mut self) -> Result<()> {
        self.active()?.flush()
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.active()?.seek(pos)
    }

    fn position(&mut self) -> Result<u64> {
        self.active()?.position()
    }

    fn len(&mut self) -> Result<u64> {
        self.active()?.len()
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        if len > self.limit && self.tier_factory.is_some() {
            self.upgrade()?;
        }
        self.active()?.set_len(len)
    }

    fn read_timeout(&self) -> Result<Duration> {
        match self.active.as_ref() {
            Some(store) => store.read_timeout(),
            None => Err(Error::Poisoned),
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.active()?.set_read_timeout(timeout)
    }

    fn write_timeout(&self) -> Result<Duration> {
        match self.active.as_ref() {
            Some(store) => store.write_timeout(),
            None => Err(Error::Poisoned),
        }
    }

    fn set_write_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.active()?.set_write_timeout(timeout)
    }

    fn read_async<'a>(
        &'a mut self,
        buf: &'a mut [u8],
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<usize>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.active()?.read_async(buf, cancel).await
        })
    }

    fn write_async<'a>(
        &'a mut self,
        buf: &'a [u8],
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if self.needs_upgrade(buf.len() as u64)? {
                self.upgrade_async(cancel).await?;
            }
            self.active()?.write_async(buf, cancel).await
        })
    }

    fn write_byte_async<'a>(
        &'a mut self,
        byte: u8,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if self.needs_upgrade(1)? {
                self.upgrade_async(cancel).await?;
            }
            self.active()?.write_byte_async(byte, cancel).await
        })
    }

    fn flush_async<'a>(&'a mut self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.active()?.flush_async(cancel).await
        })
    }
}

/// Builder for [`TieredSpillStream`].
pub struct TieredSpillStreamBuilder {
    limit: u64,
    first_tier: Option<Box<dyn ByteStream>>,
    tier_factory: Option<TierFactory>,
}

impl TieredSpillStreamBuilder {
    fn new(limit: u64) -> Self {
        Self {
            limit,
            first_tier: None,
            tier_factory: None,
        }
    }

    /// Use an explicit first-tier store instead of a fresh in-memory stream.
    pub fn first_tier(mut self, store: impl ByteStream + 'static) -> Self {
        self.first_tier = Some(Box::new(store));
        self
    }

    /// Use a custom factory for the second-tier store.
    pub fn tier_factory(
        mut self,
        factory: impl FnMut() -> Result<Box<dyn ByteStream>> + Send + 'static,
    ) -> Self {
        self.tier_factory = Some(Box::new(factory));
        self
    }

    /// Spill to a file at a generated path instead of an anonymous temp file.
    ///
    /// The file is removed when the stream is dropped.
    pub fn spill_to_paths(mut self, mut next_path: impl FnMut() -> PathBuf + Send + 'static) -> Self {
        self.tier_factory = Some(Box::new(move || {
            Ok(Box::new(FileStream::create_temp_at(next_path())?) as Box<dyn ByteStream>)
        }));
        self
    }

    /// Build the stream.
    ///
    /// Fails with [`Error::InvalidArgument`] if the supplied first-tier store
    /// does not support reading, writing and seeking.
    pub fn build(self) -> Result<TieredSpillStream> {
        let first = match self.first_tier {
            Some(store) => {
                validate_store(store.as_ref(), "first-tier")?;
                store
            }
            None => Box::new(MemoryStream::new()) as Box<dyn ByteStream>,
        };
        Ok(TieredSpillStream {
            active: Some(first),
            limit: self.limit,
            tier_factory: Some(self.tier_factory.unwrap_or_else(default_tier_factory)),
        })
    }
}

impl fmt::Debug for TieredSpillStreamBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredSpillStreamBuilder")
            .field("limit", &self.limit)
            .field("first_tier", &self.first_tier)
            .field("has_tier_factory", &self.tier_factory.is_some())
            .finish()
    }
}
