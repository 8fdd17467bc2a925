use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;

/// Datasets exported when none are named explicitly.
pub const DEFAULT_DATASETS: [&str; 3] = ["books", "posts", "users"];

/// Where a dataset's JSON document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    File(PathBuf),
    Url(String),
}

impl DatasetSource {
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            DatasetSource::Url(source.to_string())
        } else {
            DatasetSource::File(PathBuf::from(source))
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::File(path) => write!(f, "{}", path.display()),
            DatasetSource::Url(url) => f.write_str(url),
        }
    }
}

/// A named dataset to load, with the object keys to strip before export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub name: String,
    pub source: DatasetSource,
    pub redact: Vec<String>,
}

impl DatasetSpec {
    /// `<data_dir>/<name>.json`
    pub fn in_dir(name: &str, data_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            source: DatasetSource::File(data_dir.join(format!("{name}.json"))),
            redact: Vec::new(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.source, DatasetSource::Url(_))
    }

    /// Parse `NAME` or `NAME=SOURCE`; a bare name resolves under `data_dir`.
    pub fn parse(arg: &str, data_dir: &Path) -> Result<Self> {
        let (name, source) = match arg.split_once('=') {
            Some((name, source)) => (name.trim(), Some(source.trim())),
            None => (arg.trim(), None),
        };
        validate_name(name)?;

        Ok(match source {
            Some("") => bail!("Empty source for dataset {name}"),
            Some(source) => Self {
                name: name.to_string(),
                source: DatasetSource::parse(source),
                redact: Vec::new(),
            },
            None => Self::in_dir(name, data_dir),
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Dataset name must not be empty");
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        bail!("Dataset name must be a single path segment: {name}");
    }
    Ok(())
}

/// A loaded JSON dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub value: Value,
}

impl Dataset {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Parse a raw JSON document.
    pub fn from_slice(name: impl Into<String>, raw: &[u8]) -> Result<Self> {
        let name = name.into();
        let value = serde_json::from_slice(raw)
            .with_context(|| format!("Dataset {name} is not valid JSON"))?;
        Ok(Self { name, value })
    }

    /// A dataset whose backing file does not exist yet.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Value::Array(Vec::new()))
    }

    /// Name of the dataset inside an archive or on disk.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }

    /// Pretty JSON with two-space indentation, keys in document order.
    ///
    /// Integral floats are written without a fraction (`96.0` becomes `96`),
    /// the way the web app's serializer prints them.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut value = self.value.clone();
        integral_floats_to_ints(&mut value);
        serde_json::to_vec_pretty(&value)
            .with_context(|| format!("Failed to serialize dataset {}", self.name))
    }

    /// Remove `fields` from every object in a top-level array, or from the
    /// document itself when it is an object. Returns how many keys were removed.
    pub fn redact(&mut self, fields: &[String]) -> usize {
        if fields.is_empty() {
            return 0;
        }

        let mut strip = |value: &mut Value| -> usize {
            let Value::Object(map) = value else {
                return 0;
            };
            let before = map.len();
            map.retain(|key, _| !fields.iter().any(|f| f == key));
            before - map.len()
        };

        match &mut self.value {
            Value::Array(items) => items.iter_mut().map(&mut strip).sum(),
            other => strip(other),
        }
    }
}

/// Largest magnitude below which every integer is exactly representable in f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn integral_floats_to_ints(value: &mut Value) {
    match value {
        Value::Number(n) if n.is_f64() => {
            if let Some(f) = n.as_f64()
                && f.is_finite()
                && f.fract() == 0.0
                && f.abs() <= MAX_SAFE_INTEGER
            {
                *value = Value::from(f as i64);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(integral_floats_to_ints),
        Value::Object(map) => map.values_mut().for_each(integral_floats_to_ints),
        _ => {}
    }
}
