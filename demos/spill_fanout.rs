//! Mirror a write stream to an in-memory audit copy while the primary copy
//! spills to a temp file once it outgrows its memory budget.

use streamkit::{ByteStream, MemoryStream, MultiplexWriter, TieredSpillStream};

fn main() -> streamkit::Result<()> {
    tracing_subscriber::fmt::init();

    let audit = MemoryStream::new();
    let audit_handle = audit.clone();

    // Keep the first 1 KiB in memory; spill the rest to disk.
    let primary = TieredSpillStream::new(1024);

    let mut writer = MultiplexWriter::builder()
        .add_sink(primary)
        .add_sink(audit)
        .build()?;

    for chunk in 0u8..64 {
        writer.write(&[chunk; 64])?;
    }
    writer.flush()?;

    println!("audit copy holds {} bytes", audit_handle.contents().len());
    Ok(())
}
