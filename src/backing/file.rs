use crate::{ByteStream, Result};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An on-disk `ByteStream` backed by a [`File`].
///
/// - [`temp`](Self::temp) creates an anonymous temporary file that the OS
///   deletes once the handle closes; this is the default second tier of a
///   [`TieredSpillStream`](crate::TieredSpillStream).
/// - [`create_temp_at`](Self::create_temp_at) creates a file at a caller-chosen
///   path and removes it on drop.
pub struct FileStream {
    file: File,
    path: Option<PathBuf>,
    delete_on_drop: bool,
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("path", &self.path)
            .field("delete_on_drop", &self.delete_on_drop)
            .finish()
    }
}

impl FileStream {
    /// Create (or truncate) a read-write file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            file,
            path: Some(path),
            delete_on_drop: false,
        })
    }

    /// Open an existing file at `path` for reading and writing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self {
            file,
            path: Some(path),
            delete_on_drop: false,
        })
    }

    /// Create an anonymous, self-deleting temporary file stream.
    pub fn temp() -> Result<Self> {
        Ok(Self {
            file: tempfile::tempfile()?,
            path: None,
            delete_on_drop: false,
        })
    }

    /// Create a file at `path` that is removed when the stream is dropped.
    pub fn create_temp_at(path: impl Into<PathBuf>) -> Result<Self> {
        let mut stream = Self::create(path)?;
        stream.delete_on_drop = true;
        Ok(stream)
    }

    /// The path of the backing file, if it has one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        if self.delete_on_drop {
            if let Some(path) = &self.path {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!(?path, error = ?e, "Failed to remove temporary file on drop");
                }
            }
        }
    }
}

impl ByteStream for FileStream {
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
        Ok(self.file.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        Ok(self.file.write_all(buf)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.file.flush()?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.file.seek(pos)?)
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        Ok(self.file.set_len(len)?)
    }
}
