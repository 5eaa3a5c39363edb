use std::io::{Read, Result, Write};

use aes::Aes128;
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::{BufDecryptor, BufEncryptor};

use super::key::ChunkKey;

/// Chunk streams use a fixed all-zero IV; the key is unique per chunk.
pub const CHUNK_IV: [u8; 16] = [0u8; 16];

/// AES-128-CFB (128-bit segments) decrypting reader. Any read size works,
/// the keystream position is carried across calls.
pub struct CfbReader<R: Read> {
    inner: R,
    cipher: BufDecryptor<Aes128>,
}

impl<R: Read> CfbReader<R> {
    pub fn new(inner: R, key: &ChunkKey) -> Self {
        Self {
            inner,
            cipher: BufDecryptor::<Aes128>::new(&key.0.into(), &CHUNK_IV.into()),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CfbReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.decrypt(&mut buf[..n]);
        Ok(n)
    }
}

/// Encrypting counterpart of [`CfbReader`], used when sealing chunks.
pub struct CfbWriter<W: Write> {
    inner: W,
    cipher: BufEncryptor<Aes128>,
    scratch: Vec<u8>,
}

impl<W: Write> CfbWriter<W> {
    pub fn new(inner: W, key: &ChunkKey) -> Self {
        Self {
            inner,
            cipher: BufEncryptor::<Aes128>::new(&key.0.into(), &CHUNK_IV.into()),
            scratch: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CfbWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        // keystream advances per byte, so the whole buffer must reach `inner`
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.cipher.encrypt(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
