//! Store-only ZIP archive builder.
//!
//! ## Layout
//!
//! ```text
//! [LFH 0][name 0][data 0] ... [LFH n][name n][data n]
//! [CDFH 0][name 0] ... [CDFH n][name n]
//! [EOCD]
//! ```
//!
//! Entries are written in input order. Names are not validated or
//! deduplicated; an archive may carry several entries with the same name,
//! each with its own offset and checksum. No compression, timestamps, extra
//! fields or ZIP64 records are ever produced, so every size and offset has to
//! fit the 32-bit header fields.

use std::io::Write;

use anyhow::{Context, Result, bail};
use tracing::{debug, trace};

use super::crc::crc32;
use super::structures::{CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader};

/// One named byte buffer to place in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInput {
    pub name: String,
    pub content: Vec<u8>,
}

impl ArchiveInput {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Derived per-entry metadata, recorded while the archive is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRecord {
    pub crc32: u32,
    pub size: u32,
    pub lfh_offset: u32,
}

/// Encoded form of one entry.
#[derive(Debug, Clone)]
pub struct EncodedEntry {
    /// Local file header, name and content.
    pub local: Vec<u8>,
    /// Central directory header and name.
    pub central: Vec<u8>,
    pub record: EntryRecord,
}

/// Encode one entry whose local header will start at `lfh_offset`.
pub fn encode_entry(name: &[u8], content: &[u8], lfh_offset: u32) -> Result<EncodedEntry> {
    let name_len = u16::try_from(name.len())
        .with_context(|| format!("Entry name is too long ({} bytes)", name.len()))?;
    let size = u32::try_from(content.len())
        .with_context(|| format!("Entry content is too large ({} bytes)", content.len()))?;
    let crc = crc32(content);

    let mut local = Vec::with_capacity(LocalFileHeader::SIZE + name.len() + content.len());
    LocalFileHeader::stored(crc, size, name_len).write_to(&mut local)?;
    local.extend_from_slice(name);
    local.extend_from_slice(content);

    let mut central = Vec::with_capacity(CentralDirectoryHeader::SIZE + name.len());
    CentralDirectoryHeader::stored(crc, size, name_len, lfh_offset).write_to(&mut central)?;
    central.extend_from_slice(name);

    Ok(EncodedEntry {
        local,
        central,
        record: EntryRecord {
            crc32: crc,
            size,
            lfh_offset,
        },
    })
}

/// Streaming archive writer.
///
/// Local entries go straight to the underlying writer; central directory
/// records are buffered until [`finish`](ZipWriter::finish).
pub struct ZipWriter<W: Write> {
    writer: W,
    /// Bytes written so far, i.e. the offset of the next local header
    offset: u64,
    central: Vec<u8>,
    records: Vec<EntryRecord>,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            offset: 0,
            central: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Append one stored entry.
    pub fn add(&mut self, name: &str, content: &[u8]) -> Result<EntryRecord> {
        if self.records.len() >= u16::MAX as usize {
            bail!("Too many entries for a non-ZIP64 archive");
        }
        let lfh_offset = fits_u32(self.offset, "Archive offset")?;

        let entry = encode_entry(name.as_bytes(), content, lfh_offset)?;
        fits_u32(self.offset + entry.local.len() as u64, "Archive size")?;

        self.writer.write_all(&entry.local)?;
        self.offset += entry.local.len() as u64;
        self.central.extend_from_slice(&entry.central);
        self.records.push(entry.record);

        trace!(name, crc32 = entry.record.crc32, size = entry.record.size, lfh_offset, "added entry");
        Ok(entry.record)
    }

    /// Records of the entries added so far, in archive order.
    pub fn records(&self) -> &[EntryRecord] {
        &self.records
    }

    /// Write the central directory and end record, returning the writer.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = fits_u32(self.offset, "Central directory offset")?;
        let cd_size = fits_u32(self.central.len() as u64, "Central directory size")?;
        fits_u32(self.offset + self.central.len() as u64, "Archive size")?;
        // Checked in `add`
        let entries = self.records.len() as u16;

        self.writer.write_all(&self.central)?;
        EndOfCentralDirectory::new(entries, cd_size, cd_offset).write_to(&mut self.writer)?;
        self.writer.flush()?;

        debug!(entries, cd_offset, cd_size, "archive finished");
        Ok(self.writer)
    }
}

fn fits_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("{what} exceeds 4 GiB ({value} bytes)"))
}

/// Build a complete archive in memory from `inputs`, in order.
pub fn build_archive(inputs: &[ArchiveInput]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Vec::new());
    for input in inputs {
        writer.add(&input.name, &input.content)?;
    }
    writer.finish()
}
