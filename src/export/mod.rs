//! Export of catalog datasets.
//!
//! Datasets are loaded from local JSON files or HTTP URLs, optionally
//! redacted, then written either one by one as pretty JSON or all together
//! as a single store-only ZIP archive.

mod dataset;

pub use dataset::{DEFAULT_DATASETS, Dataset, DatasetSource, DatasetSpec};

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::io::{HttpFetcher, MemoryReader};
use crate::zip::{ArchiveInput, EntryRecord, VerifyReport, ZipExtractor, ZipWriter};

/// Default file name of the all-in-one archive.
pub const ARCHIVE_NAME: &str = "all-json-files.zip";

/// Loads datasets from their sources.
pub struct Exporter {
    fetcher: Option<HttpFetcher>,
}

impl Exporter {
    /// Create an exporter; an HTTP client is only built when some source is a URL.
    pub fn new(specs: &[DatasetSpec]) -> Result<Self> {
        let fetcher = if specs.iter().any(DatasetSpec::is_remote) {
            Some(HttpFetcher::new()?)
        } else {
            None
        };
        Ok(Self { fetcher })
    }

    /// Bytes downloaded so far from URL sources.
    pub fn transferred_bytes(&self) -> u64 {
        self.fetcher.as_ref().map_or(0, |f| f.transferred_bytes())
    }

    /// Load and redact one dataset.
    ///
    /// A missing local file yields an empty array, the same as a catalog that
    /// has never stored anything in that dataset.
    pub async fn load(&self, spec: &DatasetSpec) -> Result<Dataset> {
        let mut dataset = match &spec.source {
            DatasetSource::File(path) => match fs::read(path).await {
                Ok(raw) => Dataset::from_slice(&spec.name, &raw)?,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(
                        dataset = %spec.name,
                        path = %path.display(),
                        "dataset file not found, exporting empty array"
                    );
                    Dataset::empty(&spec.name)
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", path.display()));
                }
            },
            DatasetSource::Url(url) => {
                let fetcher = match &self.fetcher {
                    Some(fetcher) => fetcher,
                    None => anyhow::bail!("No HTTP client configured for {}", url),
                };
                let raw = fetcher.fetch(url).await?;
                Dataset::from_slice(&spec.name, &raw)?
            }
        };

        let removed = dataset.redact(&spec.redact);
        debug!(dataset = %spec.name, source = %spec.source, removed, "loaded dataset");
        Ok(dataset)
    }

    /// Load every dataset, in order.
    pub async fn load_all(&self, specs: &[DatasetSpec]) -> Result<Vec<Dataset>> {
        let mut datasets = Vec::with_capacity(specs.len());
        for spec in specs {
            datasets.push(self.load(spec).await?);
        }
        Ok(datasets)
    }
}

/// One entry of a written archive.
#[derive(Debug, Clone)]
pub struct ExportedEntry {
    pub name: String,
    pub record: EntryRecord,
}

/// What [`export_all`] produced.
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub entries: Vec<ExportedEntry>,
    pub archive_size: u64,
    pub verified: Option<VerifyReport>,
}

/// Serialize datasets into named archive inputs (`<name>.json`).
pub fn archive_inputs(datasets: &[Dataset]) -> Result<Vec<ArchiveInput>> {
    datasets
        .iter()
        .map(|d| -> Result<ArchiveInput> {
            Ok(ArchiveInput::new(d.file_name(), d.to_json_bytes()?))
        })
        .collect()
}

/// Build the archive bytes for `datasets`.
pub fn build_export_archive(datasets: &[Dataset]) -> Result<(Vec<u8>, Vec<ExportedEntry>)> {
    let mut writer = ZipWriter::new(Vec::new());
    let mut entries = Vec::with_capacity(datasets.len());
    for input in archive_inputs(datasets)? {
        let record = writer.add(&input.name, &input.content)?;
        entries.push(ExportedEntry {
            name: input.name,
            record,
        });
    }
    Ok((writer.finish()?, entries))
}

/// Write every dataset into one ZIP archive at `output`.
///
/// With `verify`, the archive is read back from memory and every entry's
/// checksum checked before anything is written to disk.
pub async fn export_all(
    datasets: &[Dataset],
    output: &Path,
    verify: bool,
) -> Result<ArchiveSummary> {
    let (archive, entries) = build_export_archive(datasets)?;

    let (archive, verified) = if verify {
        let reader = Arc::new(MemoryReader::new(archive));
        let report = ZipExtractor::new(reader.clone())
            .verify()
            .await
            .context("Built archive failed verification")?;
        let reader = Arc::try_unwrap(reader)
            .map_err(|_| anyhow::anyhow!("Archive reader still in use"))?;
        (reader.into_inner(), Some(report))
    } else {
        (archive, None)
    };

    write_output(output, &archive).await?;
    info!(
        path = %output.display(),
        entries = entries.len(),
        bytes = archive.len(),
        "wrote archive"
    );

    Ok(ArchiveSummary {
        entries,
        archive_size: archive.len() as u64,
        verified,
    })
}

/// Write one dataset as pretty JSON at `output`, returning the bytes written.
pub async fn export_one(dataset: &Dataset, output: &Path) -> Result<u64> {
    let bytes = dataset.to_json_bytes()?;
    write_output(output, &bytes).await?;
    info!(
        path = %output.display(),
        dataset = %dataset.name,
        bytes = bytes.len(),
        "wrote dataset"
    );
    Ok(bytes.len() as u64)
}

async fn write_output(output: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(output, bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))
}
