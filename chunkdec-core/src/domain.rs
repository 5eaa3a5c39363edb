// chunkdec_core/src/domain.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// One chunk as declared by its container. Declaration order is not
/// necessarily stream order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    pub chunk_offset: u32,
    pub chunk_length: u32,
    pub chunk_checksum: Vec<u8>,
    pub chunk_encryption_key: Vec<u8>,
}

/// Metadata for one storage host stream: the chunks it carries, in
/// declaration order.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageHostChunkList {
    pub host: Option<String>,
    pub chunk_infos: Vec<ChunkInfo>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkReference {
    pub container_index: u64,
    pub chunk_index: u64,
}

impl ChunkReference {
    pub fn new(container_index: u64, chunk_index: u64) -> Self {
        Self {
            container_index,
            chunk_index,
        }
    }
}

impl fmt::Display for ChunkReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container_index, self.chunk_index)
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum(pub Vec<u8>);

impl Checksum {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl From<&[u8]> for Checksum {
    fn from(b: &[u8]) -> Self {
        Checksum(b.to_vec())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

/// Handle to decrypted content held by a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub checksum: Checksum,
    pub len: u64,
}
