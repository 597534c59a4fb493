use crate::error::{Error, Result};
use crate::store::DataStore;

/// A store backed by one growable byte vector.
#[derive(Debug, Default, Clone)]
pub struct ArrayStore {
    data: Vec<u8>,
}

impl ArrayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }
}

impl DataStore for ArrayStore {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.data.len() {
            return Err(Error::EndOfFile);
        }
        let n = buf.len().min(self.data.len() - offset);
        buf[..n].copy_from_slice(&self.data[offset..offset + n]);
        Ok(n)
    }

    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let end = offset
            .checked_add(buf.len())
            .ok_or(Error::FileTooLarge(u64::MAX))?;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn release(&mut self) {
        self.data = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_past_end_zero_fills() {
        let mut store = ArrayStore::with_capacity(4);
        store.write(3, b"abc").unwrap();
        assert_eq!(store.size(), 6);

        let mut buf = [9u8; 8];
        assert_eq!(store.read(0, &mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], b"\0\0\0abc");
        assert_eq!(store.read(6, &mut buf), Err(Error::EndOfFile));
    }
}
