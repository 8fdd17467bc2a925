//! Command-line entry point for catalog-export.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use catalog_export::cli::{Command, JsonArgs, ZipArgs};
use catalog_export::export::{self, Exporter};
use catalog_export::{Cli, LocalFileReader, ZipExtractor};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        Command::Zip(args) => export_zip(args, &cli).await,
        Command::Json(args) => export_json(args, &cli).await,
        Command::List { archive, verbose } => list_files(archive, *verbose).await,
        Command::Verify { archive } => verify(archive, &cli).await,
    }
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the level picked from `-q`.
fn init_logging(cli: &Cli) {
    let default = if cli.is_very_quiet() { "error" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn export_zip(args: &ZipArgs, cli: &Cli) -> Result<()> {
    let specs = args.dataset_specs()?;
    let exporter = Exporter::new(&specs)?;
    let datasets = exporter.load_all(&specs).await?;

    let summary = export::export_all(&datasets, &args.output, args.verify).await?;

    if !cli.is_quiet() {
        for entry in &summary.entries {
            println!(
                "  adding: {} ({}, crc32 {:08x})",
                entry.name,
                format_size(entry.record.size as u64),
                entry.record.crc32
            );
        }
        if let Some(report) = &summary.verified {
            println!(
                "verified: {} entries, {}",
                report.entries,
                format_size(report.bytes)
            );
        }
        println!(
            "wrote {} ({})",
            args.output.display(),
            format_size(summary.archive_size)
        );
        print_transfer(&exporter);
    }

    Ok(())
}

async fn export_json(args: &JsonArgs, cli: &Cli) -> Result<()> {
    let spec = args.dataset_spec()?;
    let exporter = Exporter::new(std::slice::from_ref(&spec))?;
    let dataset = exporter.load(&spec).await?;

    let output = args.output_path();
    let written = export::export_one(&dataset, &output).await?;

    if !cli.is_quiet() {
        println!("wrote {} ({})", output.display(), format_size(written));
        print_transfer(&exporter);
    }

    Ok(())
}

fn print_transfer(exporter: &Exporter) {
    let transferred = exporter.transferred_bytes();
    if transferred > 0 {
        eprintln!("Total bytes transferred: {}", format_size(transferred));
    }
}

/// List files in the archive, optionally as a detailed table.
async fn list_files(archive: &Path, verbose: bool) -> Result<()> {
    let extractor = ZipExtractor::new(Arc::new(LocalFileReader::new(archive)?));
    let entries = extractor.list_files().await?;

    if !verbose {
        for entry in &entries {
            println!("{}", entry.file_name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>8}  {:>10}  {:>5}  Name",
        "Length", "Offset", "CRC-32", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total = 0u64;
    let mut file_count = 0usize;
    for entry in &entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {:08x}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.lfh_offset,
            entry.crc32,
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );
        if !entry.is_directory {
            total += entry.uncompressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!("{:>10}  {:>43}  {} files", total, "", file_count);

    Ok(())
}

async fn verify(archive: &Path, cli: &Cli) -> Result<()> {
    let extractor = ZipExtractor::new(Arc::new(LocalFileReader::new(archive)?));
    let report = extractor.verify().await?;

    if !cli.is_quiet() {
        println!(
            "{}: {} entries OK ({})",
            archive.display(),
            report.entries,
            format_size(report.bytes)
        );
    }

    Ok(())
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
