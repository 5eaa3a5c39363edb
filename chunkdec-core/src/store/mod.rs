use crate::domain::{Checksum, Chunk};
use crate::error::Result;
use crate::stats::Stats;
use std::io::{Read, Write};

/// Content-addressed chunk store. Implementations synchronize internally;
/// every call is atomic on its own and callers never hold a lock across
/// calls.
pub trait ChunkStore: Send + Sync {
    /// Handle for `checksum` if the store holds it.
    fn chunk(&self, checksum: &Checksum) -> Result<Option<Chunk>>;

    /// Sink for new content under `checksum`, or `None` when the store
    /// already holds it.
    fn writer(&self, checksum: &Checksum) -> Result<Option<Box<dyn ChunkSink + '_>>>;

    fn open(&self, chunk: &Chunk) -> Result<Box<dyn Read + Send + '_>>;

    fn stats(&self) -> Stats;
}

/// Pending chunk content. Dropping a sink without committing discards it.
pub trait ChunkSink: Write + Send {
    /// Publish the written bytes. If another writer published the same
    /// checksum first, theirs stays and this still succeeds.
    fn commit(self: Box<Self>) -> Result<()>;
}

pub mod disk;
pub mod memory;
