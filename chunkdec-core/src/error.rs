use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkdecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("unsupported chunk encryption key: {len} bytes, tag 0x{tag:02x}")]
    UnsupportedKey { len: usize, tag: u8 },
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ChunkdecError>;
