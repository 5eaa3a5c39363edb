use crate::error::{ChunkdecError, Result};
use hex;

pub fn parse_hex(hex_str: &str) -> Result<Vec<u8>> {
    let s = hex_str.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| ChunkdecError::Format(format!("invalid hex: {e}")))
}

pub fn parse_hex_array<const N: usize>(hex_str: &str) -> Result<[u8; N]> {
    let bytes = parse_hex(hex_str)?;
    bytes.as_slice().try_into().map_err(|_| {
        ChunkdecError::Format(format!(
            "expected {N} bytes ({} hex chars), got {}",
            N * 2,
            bytes.len()
        ))
    })
}
