use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::store::ChunkStore;
use crate::store::disk::DiskChunkStore;
use crate::store::memory::MemoryChunkStore;

pub enum Backend {
    Memory,
    Disk(PathBuf),
}

pub fn open_store(backend: Backend) -> Result<Arc<dyn ChunkStore>> {
    match backend {
        Backend::Memory => Ok(Arc::new(MemoryChunkStore::new())),
        Backend::Disk(root) => Ok(Arc::new(DiskChunkStore::open(&root)?)),
    }
}
