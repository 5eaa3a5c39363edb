#![forbid(unsafe_code)]

pub mod domain;
pub mod error;
pub mod stats;

pub mod util {
    pub mod bounded;
    pub mod hash_forward;
}

pub mod crypto {
    pub mod cfb;
    pub mod hex;
    pub mod key;
}

pub mod container {
    pub mod manifest;
    pub mod walker;
}

pub mod decrypt {
    pub mod list;
}

pub mod pack {
    pub mod sealer;
}

pub mod store;
pub mod store_factory;

// Re-exports: stable API surface
pub use decrypt::list::{ChunkListDecrypter, DecryptOptions, decrypt_chunk_list};
pub use domain::{Checksum, Chunk, ChunkInfo, ChunkReference, StorageHostChunkList};
pub use pack::sealer::{ChunkSealer, SealOptions, seal_all};
pub use store::{ChunkSink, ChunkStore};
