use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, RwLock};

use super::{ChunkSink, ChunkStore};
use crate::domain::{Checksum, Chunk};
use crate::error::Result;
use crate::stats::{Stats, StoreCounters};

#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<Checksum, Arc<[u8]>>>,
    counters: StoreCounters,
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decrypted bytes for `checksum`.
    pub fn get(&self, checksum: &Checksum) -> Option<Arc<[u8]>> {
        self.chunks.read().ok()?.get(checksum).cloned()
    }

    /// Seed the store directly, bypassing the sink path.
    pub fn insert(&self, checksum: Checksum, data: &[u8]) -> Result<()> {
        self.chunks
            .write()
            .map_err(poisoned)?
            .entry(checksum)
            .or_insert_with(|| Arc::from(data));
        Ok(())
    }
}

impl ChunkStore for MemoryChunkStore {
    fn chunk(&self, checksum: &Checksum) -> Result<Option<Chunk>> {
        let found = self
            .chunks
            .read()
            .map_err(poisoned)?
            .get(checksum)
            .map(|data| Chunk {
                checksum: checksum.clone(),
                len: data.len() as u64,
            });
        self.counters.lookup(found.is_some());
        Ok(found)
    }

    fn writer(&self, checksum: &Checksum) -> Result<Option<Box<dyn ChunkSink + '_>>> {
        let present = self.chunks.read().map_err(poisoned)?.contains_key(checksum);
        self.counters.writer(!present);
        if present {
            return Ok(None);
        }
        Ok(Some(Box::new(MemorySink {
            store: self,
            checksum: checksum.clone(),
            buf: Vec::new(),
        })))
    }

    fn open(&self, chunk: &Chunk) -> Result<Box<dyn Read + Send + '_>> {
        let data = self.get(&chunk.checksum).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such chunk: {}", chunk.checksum),
            )
        })?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn stats(&self) -> Stats {
        self.counters.snapshot()
    }
}

struct MemorySink<'a> {
    store: &'a MemoryChunkStore,
    checksum: Checksum,
    buf: Vec<u8>,
}

impl Write for MemorySink<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl ChunkSink for MemorySink<'_> {
    fn commit(self: Box<Self>) -> Result<()> {
        let MemorySink {
            store,
            checksum,
            buf,
        } = *self;
        store
            .chunks
            .write()
            .map_err(poisoned)?
            .entry(checksum)
            .or_insert_with(|| Arc::from(buf));
        store.counters.commit();
        Ok(())
    }
}
