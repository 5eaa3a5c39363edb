use std::io::{Read, Write};

use tracing::debug;

use crate::crypto::cfb::CfbWriter;
use crate::crypto::key::{ChunkKey, KEY_LEN};
use crate::domain::{Checksum, ChunkInfo, StorageHostChunkList};
use crate::error::{ChunkdecError, Result};
use crate::util::hash_forward::HashingForward;

#[derive(Clone, Default)]
pub struct SealOptions {
    /// Raw key used for every chunk. When unset each chunk gets a fresh
    /// random key.
    pub key: Option<[u8; KEY_LEN]>,
    /// Label stored as the container's host.
    pub host: Option<String>,
}

/// Builds a storage host stream: each pushed plaintext is encrypted under
/// its own `0x01` key and appended to `out`, and the matching chunk info is
/// recorded. Checksums are BLAKE3 of the plaintext.
pub struct ChunkSealer<W: Write> {
    out: W,
    opts: SealOptions,
    offset: u64,
    infos: Vec<ChunkInfo>,
}

impl<W: Write> ChunkSealer<W> {
    pub fn new(out: W, opts: SealOptions) -> Self {
        Self {
            out,
            opts,
            offset: 0,
            infos: Vec::new(),
        }
    }

    fn next_key(&self) -> Result<ChunkKey> {
        if let Some(k) = self.opts.key {
            return Ok(ChunkKey(k));
        }
        let mut k = [0u8; KEY_LEN];
        getrandom::getrandom(&mut k)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(ChunkKey(k))
    }

    /// Encrypt `src` onto the stream and return its chunk info.
    pub fn push(&mut self, mut src: impl Read) -> Result<ChunkInfo> {
        let chunk_offset = u32::try_from(self.offset).map_err(|_| {
            ChunkdecError::Format(format!("stream offset {} exceeds u32", self.offset))
        })?;
        let key = self.next_key()?;
        let mut hasher = blake3::Hasher::new();
        let n = {
            let mut w = HashingForward::new(CfbWriter::new(&mut self.out, &key), &mut hasher);
            std::io::copy(&mut src, &mut w)?
        };
        let chunk_length = u32::try_from(n)
            .map_err(|_| ChunkdecError::Format(format!("chunk of {n} bytes exceeds u32")))?;
        self.offset += n;

        let info = ChunkInfo {
            chunk_offset,
            chunk_length,
            chunk_checksum: hasher.finalize().as_bytes().to_vec(),
            chunk_encryption_key: key.wrap(),
        };
        debug!(
            checksum = %Checksum::from(info.chunk_checksum.as_slice()),
            offset = chunk_offset,
            length = chunk_length,
            "sealed chunk"
        );
        self.infos.push(info.clone());
        Ok(info)
    }

    pub fn finish(mut self) -> Result<(StorageHostChunkList, W)> {
        self.out.flush()?;
        let list = StorageHostChunkList {
            host: self.opts.host,
            chunk_infos: self.infos,
        };
        Ok((list, self.out))
    }
}

/// Seal every buffer in `plaintexts`, in order, into one stream.
pub fn seal_all<I, B>(plaintexts: I, opts: SealOptions) -> Result<(StorageHostChunkList, Vec<u8>)>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut sealer = ChunkSealer::new(Vec::new(), opts);
    for pt in plaintexts {
        sealer.push(pt.as_ref())?;
    }
    sealer.finish()
}
