use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};

use crate::export::{ARCHIVE_NAME, DEFAULT_DATASETS, DatasetSpec};

#[derive(Parser, Debug)]
#[command(name = "catalog-export")]
#[command(version)]
#[command(about = "Export catalog JSON datasets as files or a store-only ZIP", long_about = None)]
#[command(after_help = "Examples:\n  \
  catalog-export zip -d src/data --verify          pack books, posts and users into all-json-files.zip\n  \
  catalog-export zip --redact users:password       leave password hashes out of users.json\n  \
  catalog-export json books --source http://localhost:3000/api/books\n  \
  catalog-export list -v all-json-files.zip")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pack datasets into a single ZIP archive
    Zip(ZipArgs),
    /// Write one dataset as pretty-printed JSON
    Json(JsonArgs),
    /// List the entries of an archive
    List {
        /// ZIP archive path
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Show sizes, checksums and dates
        #[arg(short = 'v')]
        verbose: bool,
    },
    /// Check every entry of an archive against its CRC-32
    Verify {
        /// ZIP archive path
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct DataDirArg {
    /// Directory holding <name>.json dataset files
    #[arg(
        short = 'd',
        long,
        value_name = "DIR",
        env = "CATALOG_DATA_DIR",
        default_value = "src/data"
    )]
    pub data_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ZipArgs {
    #[command(flatten)]
    pub data: DataDirArg,

    /// Output archive path
    #[arg(short = 'o', long, value_name = "FILE", default_value = ARCHIVE_NAME)]
    pub output: PathBuf,

    /// Dataset to include as NAME or NAME=SOURCE (default: books, posts, users)
    #[arg(long = "dataset", value_name = "NAME[=SOURCE]")]
    pub datasets: Vec<String>,

    /// Drop a key from a dataset's objects, as NAME:FIELD
    #[arg(long, value_name = "NAME:FIELD")]
    pub redact: Vec<String>,

    /// Read the archive back and check every entry before writing it
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args, Debug)]
pub struct JsonArgs {
    /// Dataset name, e.g. books
    #[arg(value_name = "NAME")]
    pub name: String,

    #[command(flatten)]
    pub data: DataDirArg,

    /// File path or HTTP URL to read instead of <DIR>/<NAME>.json
    #[arg(long, value_name = "SOURCE")]
    pub source: Option<String>,

    /// Output path (default: <NAME>.json)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Drop a key from the dataset's objects
    #[arg(long, value_name = "FIELD")]
    pub redact: Vec<String>,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}

impl ZipArgs {
    /// Resolve the dataset list with redactions attached.
    pub fn dataset_specs(&self) -> Result<Vec<DatasetSpec>> {
        let dir = self.data.data_dir.as_path();
        let mut specs: Vec<DatasetSpec> = if self.datasets.is_empty() {
            DEFAULT_DATASETS
                .iter()
                .map(|name| DatasetSpec::in_dir(name, dir))
                .collect()
        } else {
            self.datasets
                .iter()
                .map(|arg| DatasetSpec::parse(arg, dir))
                .collect::<Result<Vec<_>>>()?
        };

        for rule in &self.redact {
            let Some((name, field)) = rule.split_once(':') else {
                bail!("Redaction must look like NAME:FIELD, got {rule}");
            };
            let mut matched = false;
            for spec in specs.iter_mut().filter(|s| s.name == name) {
                spec.redact.push(field.to_string());
                matched = true;
            }
            if !matched {
                bail!("Redaction {rule} names a dataset that is not exported");
            }
        }

        Ok(specs)
    }
}

impl JsonArgs {
    pub fn dataset_spec(&self) -> Result<DatasetSpec> {
        let mut spec = match &self.source {
            Some(source) => {
                DatasetSpec::parse(&format!("{}={}", self.name, source), Path::new(""))?
            }
            None => DatasetSpec::parse(&self.name, &self.data.data_dir)?,
        };
        spec.redact = self.redact.clone();
        Ok(spec)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.json", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("catalog-export").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn zip_defaults_to_three_datasets() {
        let cli = parse(&["zip", "-d", "data"]);
        let Command::Zip(args) = cli.command else {
            panic!("expected zip command");
        };
        assert_eq!(args.output, PathBuf::from(ARCHIVE_NAME));
        let names: Vec<_> = args
            .dataset_specs()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["books", "posts", "users"]);
    }

    #[test]
    fn zip_redaction_targets_named_dataset() {
        let cli = parse(&["zip", "-d", "data", "--redact", "users:password", "-q"]);
        assert!(cli.is_quiet());
        let Command::Zip(args) = cli.command else {
            panic!("expected zip command");
        };
        let specs = args.dataset_specs().unwrap();
        assert!(specs[0].redact.is_empty());
        assert_eq!(specs[2].redact, ["password"]);
    }

    #[test]
    fn zip_rejects_unknown_redaction_target() {
        let cli = parse(&["zip", "--dataset", "books", "--redact", "users:password"]);
        let Command::Zip(args) = cli.command else {
            panic!("expected zip command");
        };
        assert!(args.dataset_specs().is_err());
    }

    #[test]
    fn json_source_overrides_data_dir() {
        let cli = parse(&["json", "books", "--source", "https://catalog.example/api/books"]);
        let Command::Json(args) = cli.command else {
            panic!("expected json command");
        };
        let spec = args.dataset_spec().unwrap();
        assert!(spec.is_remote());
        assert_eq!(args.output_path(), PathBuf::from("books.json"));
    }
}
