//! Low-level ZIP archive parser.
//!
//! Reads archives from any source implementing [`ReadAt`]:
//! 1. Find the End of Central Directory (EOCD) at the end of the source
//! 2. Read the whole Central Directory in one call
//! 3. For extraction, read each entry's Local File Header to find its data
//!
//! ZIP64 and multi-disk archives are rejected; the writer never produces
//! them.

use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Result, bail};
use tracing::debug;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
const MAX_COMMENT_SIZE: u64 = 65535;

/// ZIP64 End of Central Directory Locator - 20 bytes, directly before the EOCD
const ZIP64_LOCATOR_SIGNATURE: &[u8] = b"PK\x06\x07";
const ZIP64_LOCATOR_SIZE: u64 = 20;

/// Low-level ZIP file parser.
///
/// Typically used through [`ZipExtractor`](super::ZipExtractor).
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Returns the record and its offset in the source. Archives with a
    /// trailing comment are handled by scanning backwards for the signature.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            bail!("Not a valid ZIP file");
        }

        // Common case: no comment, EOCD is the last 22 bytes
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_at(offset, &mut buf).await?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            return Ok((EndOfCentralDirectory::from_bytes(&buf)?, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_at(search_start, &mut buf).await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            // The comment must run exactly to the end of the source
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Whether a ZIP64 End of Central Directory Locator sits right before the EOCD.
    async fn has_zip64_locator(&self, eocd_offset: u64) -> Result<bool> {
        let Some(locator_offset) = eocd_offset.checked_sub(ZIP64_LOCATOR_SIZE) else {
            return Ok(false);
        };
        let mut sig = [0u8; 4];
        self.reader.read_at(locator_offset, &mut sig).await?;
        Ok(sig == ZIP64_LOCATOR_SIGNATURE)
    }

    /// List all entries from the Central Directory, in directory order.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        // 0xFFFF entries or a 0xFFFFFFFF offset is still a plain archive
        // unless a ZIP64 locator actually precedes the end record
        if eocd.is_zip64() && self.has_zip64_locator(eocd_offset).await? {
            bail!("ZIP64 archives are not supported");
        }
        if eocd.disk_number != 0 || eocd.disk_with_cd != 0 || eocd.disk_entries != eocd.total_entries
        {
            bail!("Multi-disk archives are not supported");
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        if cd_offset + cd_size > eocd_offset {
            bail!(
                "Central Directory ({} bytes at {}) overlaps the end record at {}",
                cd_size,
                cd_offset,
                eocd_offset
            );
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_at(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());
        for _ in 0..eocd.total_entries {
            entries.push(Self::parse_cdfh(&mut cursor)?);
        }

        if cursor.position() != cd_size {
            bail!(
                "Central Directory size mismatch: end record says {} bytes, entries use {}",
                cd_size,
                cursor.position()
            );
        }

        debug!(entries = entries.len(), cd_offset, cd_size, "read central directory");
        Ok(entries)
    }

    /// Parse one Central Directory File Header and its trailing fields.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        let header = CentralDirectoryHeader::read_from(cursor)?;

        let mut file_name_bytes = vec![0u8; header.file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        // Lossy: names are written as UTF-8 but not flagged as such
        let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();

        // Extra field and comment are not used
        let skip = header.extra_field_length as u64 + header.file_comment_length as u64;
        let next = cursor.position() + skip;
        if next > cursor.get_ref().len() as u64 {
            bail!("Truncated Central Directory entry: {}", file_name);
        }
        cursor.set_position(next);

        Ok(ZipFileEntry::from_header(&header, file_name))
    }

    /// Read an entry's Local File Header and return where its data begins.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LocalFileHeader::SIZE];
        self.reader.read_at(entry.lfh_offset, &mut lfh_buf).await?;

        let lfh = LocalFileHeader::from_bytes(&lfh_buf)?;

        Ok(entry.lfh_offset
            + LocalFileHeader::SIZE as u64
            + lfh.file_name_length as u64
            + lfh.extra_field_length as u64)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}
