use std::io::Read;
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use tracing::{debug, warn};

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::crc::crc32;
use super::parser::ZipParser;
use super::structures::{CompressionMethod, LocalFileHeader, ZipFileEntry};

/// Outcome of checking every entry of an archive.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Entries whose data and checksum matched.
    pub entries: usize,
    /// Total uncompressed bytes checked.
    pub bytes: u64,
}

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Extract file data to memory, checking size and CRC-32.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.get_data_offset(entry).await?;
        let source_size = self.parser.reader().size();
        if data_offset + entry.compressed_size > source_size {
            bail!("Entry data runs past the end of the archive: {}", entry.file_name);
        }

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser.reader().read_at(data_offset, &mut raw).await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                // One byte past the declared size is enough to detect a mismatch
                DeflateDecoder::new(raw.as_slice())
                    .take(entry.uncompressed_size + 1)
                    .read_to_end(&mut out)
                    .with_context(|| format!("Failed to inflate {}", entry.file_name))?;
                out
            }
            CompressionMethod::Unknown(method) => {
                bail!(
                    "Unsupported compression method: {} (only STORED and DEFLATE are supported)",
                    method
                );
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "Size mismatch for {}: expected {} bytes, got {}",
                entry.file_name,
                entry.uncompressed_size,
                data.len()
            );
        }

        let crc = crc32(&data);
        if crc != entry.crc32 {
            bail!(
                "CRC-32 mismatch for {}: expected {:08x}, got {:08x}",
                entry.file_name,
                entry.crc32,
                crc
            );
        }

        Ok(data)
    }

    /// Read back every entry, checking local headers, sizes and checksums.
    pub async fn verify(&self) -> Result<VerifyReport> {
        let entries = self.list_files().await?;
        let mut report = VerifyReport::default();

        for entry in &entries {
            let mut lfh_buf = vec![0u8; LocalFileHeader::SIZE];
            self.parser.reader().read_at(entry.lfh_offset, &mut lfh_buf).await?;
            let lfh = LocalFileHeader::from_bytes(&lfh_buf)
                .with_context(|| format!("Bad local header offset for {}", entry.file_name))?;
            if lfh.crc32 != entry.crc32 && lfh.flags & 0x0008 == 0 {
                warn!(name = %entry.file_name, "local header CRC differs from central directory");
            }

            if entry.is_directory {
                continue;
            }
            let data = self.extract_to_memory(entry).await?;
            report.entries += 1;
            report.bytes += data.len() as u64;
            debug!(name = %entry.file_name, bytes = data.len(), "verified entry");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::{ArchiveInput, CentralDirectoryHeader, EndOfCentralDirectory, build_archive};
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::Write;

    fn extractor_for(bytes: Vec<u8>) -> ZipExtractor<MemoryReader> {
        ZipExtractor::new(Arc::new(MemoryReader::new(bytes)))
    }

    #[tokio::test]
    async fn extracts_binary_content() {
        let payload: Vec<u8> = (0..=255u8).chain([0, 0xFF, 0x80]).collect();
        let archive = build_archive(&[ArchiveInput::new("blob.bin", payload.clone())]).unwrap();
        let extractor = extractor_for(archive);
        let entries = extractor.list_files().await.unwrap();
        assert_eq!(extractor.extract_to_memory(&entries[0]).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn detects_corrupted_data() {
        let mut archive = build_archive(&[ArchiveInput::new("a.json", "{\"a\":1}")]).unwrap();
        // First content byte sits right after the header and name
        archive[LocalFileHeader::SIZE + "a.json".len()] ^= 0xFF;

        let extractor = extractor_for(archive);
        let err = extractor.verify().await.unwrap_err();
        assert!(err.to_string().contains("CRC-32 mismatch"));
    }

    #[tokio::test]
    async fn verify_counts_entries_and_bytes() {
        let archive = build_archive(&[
            ArchiveInput::new("books.json", "[]"),
            ArchiveInput::new("posts.json", "[]"),
            ArchiveInput::new("users.json", ""),
        ])
        .unwrap();
        let report = extractor_for(archive).verify().await.unwrap();
        assert_eq!(report.entries, 3);
        assert_eq!(report.bytes, 4);
    }

    /// One DEFLATE entry declaring `uncompressed_size`, with a valid CRC.
    fn deflated_archive(name: &str, data: &[u8], uncompressed_size: u32) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let packed = encoder.finish().unwrap();

        let crc = crc32(data);
        let name_len = name.len() as u16;
        let packed_len = packed.len() as u32;

        let mut lfh = LocalFileHeader::stored(crc, packed_len, name_len);
        lfh.compression_method = CompressionMethod::Deflate.as_u16();
        lfh.uncompressed_size = uncompressed_size;
        let mut cdfh = CentralDirectoryHeader::stored(crc, packed_len, name_len, 0);
        cdfh.compression_method = CompressionMethod::Deflate.as_u16();
        cdfh.uncompressed_size = uncompressed_size;

        let mut out = Vec::new();
        lfh.write_to(&mut out).unwrap();
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&packed);
        let cd_offset = out.len() as u32;
        cdfh.write_to(&mut out).unwrap();
        out.extend_from_slice(name.as_bytes());
        let cd_size = out.len() as u32 - cd_offset;
        EndOfCentralDirectory::new(1, cd_size, cd_offset)
            .write_to(&mut out)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn inflates_deflate_entries() {
        let text = "کتاب و مقاله ".repeat(200);
        let archive = deflated_archive("posts.json", text.as_bytes(), text.len() as u32);
        assert!(archive.len() < text.len());

        let extractor = extractor_for(archive);
        let entries = extractor.list_files().await.unwrap();
        assert_eq!(entries[0].compression_method, CompressionMethod::Deflate);
        assert_eq!(
            extractor.extract_to_memory(&entries[0]).await.unwrap(),
            text.as_bytes()
        );

        let report = extractor.verify().await.unwrap();
        assert_eq!(report.entries, 1);
        assert_eq!(report.bytes, text.len() as u64);
    }

    #[tokio::test]
    async fn rejects_wrong_deflate_size() {
        let text = "{\"title\": \"سووشون\"} ".repeat(100);

        for declared in [text.len() as u32 - 10, text.len() as u32 + 10] {
            let extractor = extractor_for(deflated_archive("books.json", text.as_bytes(), declared));
            let entries = extractor.list_files().await.unwrap();
            let err = extractor.extract_to_memory(&entries[0]).await.unwrap_err();
            assert!(err.to_string().contains("Size mismatch"), "{err}");
            assert!(extractor.verify().await.is_err());
        }
    }
}
