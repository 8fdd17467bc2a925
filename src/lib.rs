//! # catalog-export
//!
//! Export of the catalog's flat-file JSON datasets (`books.json`,
//! `posts.json`, `users.json`), either one file at a time or all together as
//! a single store-only ZIP archive.
//!
//! ## Features
//!
//! - Table-driven CRC-32 (ZIP variant) with a lazily built, shared table
//! - Store-only ZIP writer producing archives any standard unzip tool reads
//! - Datasets from local files or HTTP URLs, with optional key redaction
//! - Archive listing and CRC verification for STORED and DEFLATE entries
//!
//! ## Example
//!
//! ```
//! use catalog_export::zip::{ArchiveInput, build_archive, crc32};
//!
//! let archive = build_archive(&[ArchiveInput::new("a.json", "{}")]).unwrap();
//! assert_eq!(&archive[0..4], b"PK\x03\x04");
//! assert_eq!(crc32(b""), 0);
//! ```

pub mod cli;
pub mod export;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use export::{Dataset, DatasetSource, DatasetSpec, Exporter};
pub use io::{HttpFetcher, LocalFileReader, MemoryReader, ReadAt};
pub use crate::zip::{ArchiveInput, ZipExtractor, ZipFileEntry, ZipWriter, build_archive, crc32};
