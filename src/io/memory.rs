use super::ReadAt;
use anyhow::{Result, bail};
use async_trait::async_trait;

/// Reader over an archive that is already in memory, such as one just built
/// for export.
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.data.len() as u64;
        if offset > len || offset + buf.len() as u64 > len {
            bail!(
                "Read of {} bytes at {} is out of bounds ({} bytes available)",
                buf.len(),
                offset,
                len
            );
        }
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_within_bounds() {
        let reader = MemoryReader::new(b"PK\x05\x06rest".to_vec());
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_at(4, &mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"rest");
    }

    #[tokio::test]
    async fn rejects_out_of_bounds() {
        let reader = MemoryReader::new(vec![1, 2, 3]);
        let mut buf = [0u8; 2];
        assert!(reader.read_at(2, &mut buf).await.is_err());
    }
}
