//! Fixed-layout ZIP records.
//!
//! Every record here can be written (for building archives) and parsed back
//! (for listing and verifying them). All integers are little-endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

use anyhow::{Result, bail};

/// "Version needed to extract" for a stored, non-ZIP64 entry (2.0).
pub const VERSION_NEEDED: u16 = 20;

/// "Version made by", kept as a fixed constant: upper byte 3 (UNIX),
/// lower byte 20 (spec version 2.0).
pub const VERSION_MADE_BY: u16 = 0x0314;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Local File Header (LFH) - 30 bytes, followed by the name and entry data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    /// Header for a stored entry with zeroed timestamps.
    pub fn stored(crc32: u32, size: u32, file_name_length: u16) -> Self {
        Self {
            version_needed: VERSION_NEEDED,
            flags: 0,
            compression_method: CompressionMethod::Stored.as_u16(),
            last_mod_time: 0,
            last_mod_date: 0,
            crc32,
            compressed_size: size,
            uncompressed_size: size,
            file_name_length,
            extra_field_length: 0,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.version_needed)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method)?;
        w.write_u16::<LittleEndian>(self.last_mod_time)?;
        w.write_u16::<LittleEndian>(self.last_mod_date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(self.compressed_size)?;
        w.write_u32::<LittleEndian>(self.uncompressed_size)?;
        w.write_u16::<LittleEndian>(self.file_name_length)?;
        w.write_u16::<LittleEndian>(self.extra_field_length)?;
        Ok(())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid Local File Header");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: cursor.read_u16::<LittleEndian>()?,
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes, followed by the name,
/// extra field and comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u32,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const SIZE: usize = 46;

    /// Directory record for a stored entry whose local header sits at `lfh_offset`.
    pub fn stored(crc32: u32, size: u32, file_name_length: u16, lfh_offset: u32) -> Self {
        Self {
            version_made_by: VERSION_MADE_BY,
            version_needed: VERSION_NEEDED,
            flags: 0,
            compression_method: CompressionMethod::Stored.as_u16(),
            last_mod_time: 0,
            last_mod_date: 0,
            crc32,
            compressed_size: size,
            uncompressed_size: size,
            file_name_length,
            extra_field_length: 0,
            file_comment_length: 0,
            disk_number_start: 0,
            internal_attrs: 0,
            external_attrs: 0,
            lfh_offset,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.version_made_by)?;
        w.write_u16::<LittleEndian>(self.version_needed)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method)?;
        w.write_u16::<LittleEndian>(self.last_mod_time)?;
        w.write_u16::<LittleEndian>(self.last_mod_date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(self.compressed_size)?;
        w.write_u32::<LittleEndian>(self.uncompressed_size)?;
        w.write_u16::<LittleEndian>(self.file_name_length)?;
        w.write_u16::<LittleEndian>(self.extra_field_length)?;
        w.write_u16::<LittleEndian>(self.file_comment_length)?;
        w.write_u16::<LittleEndian>(self.disk_number_start)?;
        w.write_u16::<LittleEndian>(self.internal_attrs)?;
        w.write_u32::<LittleEndian>(self.external_attrs)?;
        w.write_u32::<LittleEndian>(self.lfh_offset)?;
        Ok(())
    }

    /// Read the fixed part of a header, leaving the cursor at the file name.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut sig = [0u8; 4];
        r.read_exact(&mut sig)?;
        if sig != Self::SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        Ok(Self {
            version_made_by: r.read_u16::<LittleEndian>()?,
            version_needed: r.read_u16::<LittleEndian>()?,
            flags: r.read_u16::<LittleEndian>()?,
            compression_method: r.read_u16::<LittleEndian>()?,
            last_mod_time: r.read_u16::<LittleEndian>()?,
            last_mod_date: r.read_u16::<LittleEndian>()?,
            crc32: r.read_u32::<LittleEndian>()?,
            compressed_size: r.read_u32::<LittleEndian>()?,
            uncompressed_size: r.read_u32::<LittleEndian>()?,
            file_name_length: r.read_u16::<LittleEndian>()?,
            extra_field_length: r.read_u16::<LittleEndian>()?,
            file_comment_length: r.read_u16::<LittleEndian>()?,
            disk_number_start: r.read_u16::<LittleEndian>()?,
            internal_attrs: r.read_u16::<LittleEndian>()?,
            external_attrs: r.read_u32::<LittleEndian>()?,
            lfh_offset: r.read_u32::<LittleEndian>()?,
        })
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Single-disk record without a comment.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.disk_number)?;
        w.write_u16::<LittleEndian>(self.disk_with_cd)?;
        w.write_u16::<LittleEndian>(self.disk_entries)?;
        w.write_u16::<LittleEndian>(self.total_entries)?;
        w.write_u32::<LittleEndian>(self.cd_size)?;
        w.write_u32::<LittleEndian>(self.cd_offset)?;
        w.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// True when any field holds the ZIP64 escape value.
    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    pub(crate) fn from_header(header: &CentralDirectoryHeader, file_name: String) -> Self {
        let is_directory = file_name.ends_with('/');
        Self {
            file_name,
            compression_method: CompressionMethod::from_u16(header.compression_method),
            compressed_size: header.compressed_size as u64,
            uncompressed_size: header.uncompressed_size as u64,
            crc32: header.crc32,
            lfh_offset: header.lfh_offset as u64,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
            is_directory,
        }
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_header_layout() {
        let header = LocalFileHeader::stored(0xDEAD_BEEF, 7, 6);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), LocalFileHeader::SIZE);
        assert_eq!(&buf[0..4], &0x04034B50u32.to_le_bytes());
        assert_eq!(&buf[4..6], &20u16.to_le_bytes());
        assert_eq!(&buf[8..10], &[0, 0]);
        assert_eq!(&buf[14..18], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&buf[18..22], &7u32.to_le_bytes());
        assert_eq!(&buf[22..26], &7u32.to_le_bytes());
        assert_eq!(&buf[26..28], &6u16.to_le_bytes());
        assert_eq!(&buf[28..30], &[0, 0]);

        assert_eq!(LocalFileHeader::from_bytes(&buf).unwrap(), header);
    }

    #[test]
    fn central_header_layout() {
        let header = CentralDirectoryHeader::stored(1, 2, 3, 0x0102_0304);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), CentralDirectoryHeader::SIZE);
        assert_eq!(&buf[0..4], &0x02014B50u32.to_le_bytes());
        assert_eq!(&buf[4..6], &0x0314u16.to_le_bytes());
        assert_eq!(&buf[6..8], &20u16.to_le_bytes());
        assert_eq!(&buf[42..46], &0x0102_0304u32.to_le_bytes());

        let parsed = CentralDirectoryHeader::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn eocd_layout() {
        let eocd = EndOfCentralDirectory::new(3, 150, 400);
        let mut buf = Vec::new();
        eocd.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), EndOfCentralDirectory::SIZE);
        assert_eq!(&buf[0..4], &0x06054B50u32.to_le_bytes());
        assert_eq!(&buf[8..10], &3u16.to_le_bytes());
        assert_eq!(&buf[10..12], &3u16.to_le_bytes());
        assert_eq!(&buf[12..16], &150u32.to_le_bytes());
        assert_eq!(&buf[16..20], &400u32.to_le_bytes());

        let parsed = EndOfCentralDirectory::from_bytes(&buf).unwrap();
        assert_eq!(parsed, eocd);
        assert!(!parsed.is_zip64());
    }

    #[test]
    fn rejects_wrong_signature() {
        assert!(EndOfCentralDirectory::from_bytes(&[0u8; 22]).is_err());
        assert!(LocalFileHeader::from_bytes(&[0u8; 30]).is_err());
        assert!(CentralDirectoryHeader::read_from(&mut Cursor::new(vec![0u8; 46])).is_err());
    }

    #[test]
    fn dos_timestamp_fields() {
        let header = CentralDirectoryHeader {
            last_mod_date: (44 << 9) | (3 << 5) | 21,
            last_mod_time: (13 << 11) | (30 << 5) | 5,
            ..CentralDirectoryHeader::stored(0, 0, 1, 0)
        };
        let entry = ZipFileEntry::from_header(&header, "a".to_string());
        assert_eq!(entry.mod_date(), (2024, 3, 21));
        assert_eq!(entry.mod_time(), (13, 30, 10));
    }
}
