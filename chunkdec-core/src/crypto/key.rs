use crate::error::{ChunkdecError, Result};

/// Tag byte of a wrapped key carrying a raw AES-128 key.
pub const KEY_TYPE_RAW_AES: u8 = 0x01;
pub const KEY_LEN: usize = 16;
pub const WRAPPED_KEY_LEN: usize = KEY_LEN + 1;

/// Raw AES-128 chunk key.
#[derive(Clone)]
pub struct ChunkKey(pub [u8; KEY_LEN]);

impl ChunkKey {
    /// Strip the format tag from a wrapped key. Only `0x01 || key[16]` is
    /// understood.
    pub fn unwrap_key(wrapped: &[u8]) -> Result<Self> {
        match wrapped {
            [KEY_TYPE_RAW_AES, rest @ ..] if rest.len() == KEY_LEN => {
                let mut k = [0u8; KEY_LEN];
                k.copy_from_slice(rest);
                Ok(ChunkKey(k))
            }
            _ => Err(ChunkdecError::UnsupportedKey {
                len: wrapped.len(),
                tag: wrapped.first().copied().unwrap_or(0),
            }),
        }
    }

    pub fn wrap(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WRAPPED_KEY_LEN);
        out.push(KEY_TYPE_RAW_AES);
        out.extend_from_slice(&self.0);
        out
    }
}

// Keys never show up in Debug output.
impl std::fmt::Debug for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChunkKey(..)")
    }
}
