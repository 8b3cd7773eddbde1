//! Composite stream wrappers that sit between a producer and its consumers.
//!
//! These wrappers implement [`ByteStream`](crate::ByteStream) by coordinating
//! one or more underlying streams. They compose freely: a wrapper can itself
//! be handed to another wrapper.
//!
//! # Available Wrappers
//!
//! - [`MultiplexWriter`] - Replicates every write to a fixed set of sinks
//! - [`TieredSpillStream`] - Starts in a fast, size-limited store and spills
//!   to a larger one exactly once when a byte threshold would be exceeded
//!
//! # Examples
//!
//! ## Spilling writes to disk past a threshold
//!
//! ```no_run
//! # fn example() -> streamkit::Result<()> {
//! use streamkit::{ByteStream, TieredSpillStream};
//!
//! // First 4 KiB stay in memory; anything beyond spills to a temp file.
//! let mut stream = TieredSpillStream::new(4096);
//!
//! stream.write(&vec![0u8; 8192])?;
//! assert!(stream.is_on_large_store());
//! # Ok(())
//! # }
//! ```
//!
//! ## Composing Wrappers
//!
//! ```no_run
//! # fn example() -> streamkit::Result<()> {
//! use streamkit::{ByteStream, MemoryStream, MultiplexWriter, TieredSpillStream};
//!
//! // Replicate writes to an in-memory copy and a spilling stream.
//! let mut writer = MultiplexWriter::builder()
//!     .add_sink(MemoryStream::new())
//!     .add_sink(TieredSpillStream::new(4096))
//!     .build()?;
//!
//! writer.write(b"replicated everywhere")?;
//! # Ok(())
//! # }
//! ```

pub mod multiplex;
pub mod spill;

pub use multiplex::{ConcurrencyPolicy, MultiplexWriter, MultiplexWriterBuilder};
pub use spill::{TierFactory, TieredSpillStream, TieredSpillStreamBuilder};
