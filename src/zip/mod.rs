//! ZIP archive writing and reading.
//!
//! - [`crc`]: the CRC-32 checksum stored with every entry
//! - [`structures`]: fixed-layout records (local header, central directory
//!   header, end of central directory) with encode and decode
//! - [`writer`]: store-only archive builder
//! - `parser` / `extractor`: read archives back to list and verify them
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Archives written here are always stored (no compression), carry zeroed
//! timestamps and never use ZIP64. The reader additionally accepts DEFLATE
//! entries so archives repacked by other tools can still be checked.

pub mod crc;
mod extractor;
mod parser;
pub mod structures;
pub mod writer;

pub use crc::{Crc32, crc32};
pub use extractor::{VerifyReport, ZipExtractor};
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{ArchiveInput, EncodedEntry, EntryRecord, ZipWriter, build_archive, encode_entry};
