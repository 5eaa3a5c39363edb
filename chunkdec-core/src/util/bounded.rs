use std::io::{ErrorKind, Read, Result};

/// Read view over the next `limit` bytes of a shared stream. Dropping it
/// leaves the underlying stream open; whatever was not read stays unread
/// until [`Bounded::drain`] is called.
pub struct Bounded<'a, R: Read + ?Sized> {
    inner: &'a mut R,
    remaining: u64,
}

impl<'a, R: Read + ?Sized> Bounded<'a, R> {
    pub fn new(inner: &'a mut R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Consume the rest of the view. A stream that ends early is an error,
    /// as every later chunk would be misaligned.
    pub fn drain(&mut self, buf: &mut [u8]) -> Result<u64> {
        let mut n = 0u64;
        while self.remaining > 0 {
            match self.read(buf) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("stream ended with {} chunk bytes missing", self.remaining),
                    ));
                }
                Ok(k) => n += k as u64,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(n)
    }
}

impl<'a, R: Read + ?Sized> Read for Bounded<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let n = self.inner.read(&mut buf[..want])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}
