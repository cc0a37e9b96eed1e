use crate::dataset::Dataset;
use crate::report::BuildReport;
use crate::retry::{with_retry, Transient};
use crate::validate::{Split, Table};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const PREFIX: &str = "battle_dataset";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("{} already exists (pass --overwrite to replace it)", .0.display())]
    Exists(PathBuf),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to encode report {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Transient for ArtifactError {
    fn is_transient(&self) -> bool {
        match self {
            ArtifactError::Io { source, .. } => source.is_transient(),
            ArtifactError::Csv { source, .. } => match source.kind() {
                csv::ErrorKind::Io(err) => err.is_transient(),
                _ => false,
            },
            ArtifactError::Exists(_) | ArtifactError::Json { .. } => false,
        }
    }
}

/// File locations for one dataset version and scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub train: PathBuf,
    pub test: PathBuf,
    pub report: PathBuf,
}

impl ArtifactPaths {
    pub fn new(out_dir: &Path, tag: &str) -> Self {
        ArtifactPaths {
            train: out_dir.join(format!("{PREFIX}_{tag}_train.csv")),
            test: out_dir.join(format!("{PREFIX}_{tag}_test.csv")),
            report: out_dir.join(format!("{PREFIX}_{tag}_report.json")),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.train, &self.test, &self.report]
    }

    pub fn split(&self, split: Split) -> &Path {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = fs::remove_file(path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "could not clean up artifact");
            }
        }
    }
}

/// Stages every file as a `.tmp` sibling and renames them into place only
/// once all of them are written. On failure everything this call created is
/// removed again, so a tag is either fully published or absent.
fn publish_all(contents: &[(&Path, Vec<u8>)], retries: u32) -> Result<(), ArtifactError> {
    let mut staged: Vec<PathBuf> = Vec::with_capacity(contents.len());
    for (path, bytes) in contents {
        let tmp = tmp_path(path);
        let written = with_retry(retries, "staging artifact", || {
            fs::write(&tmp, bytes).map_err(io_error(&tmp))
        });
        staged.push(tmp);
        if let Err(err) = written {
            discard(&staged);
            return Err(err);
        }
    }

    let mut published: Vec<PathBuf> = Vec::with_capacity(contents.len());
    for ((path, bytes), tmp) in contents.iter().zip(&staged) {
        let renamed = with_retry(retries, "publishing artifact", || {
            fs::rename(tmp, path).map_err(io_error(path))
        });
        if let Err(err) = renamed {
            discard(&published);
            discard(&staged);
            return Err(err);
        }
        debug!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
        published.push(path.to_path_buf());
    }
    Ok(())
}

fn encode_table(table: &Table, path: &Path) -> Result<Vec<u8>, ArtifactError> {
    let csv_error = |source: csv::Error| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers).map_err(csv_error)?;
    for row in &table.rows {
        writer.write_record(row).map_err(csv_error)?;
    }
    writer
        .into_inner()
        .map_err(|err| ArtifactError::Io {
            path: path.to_path_buf(),
            source: err.into_error(),
        })
}

/// Publishes both splits and the build report under `out_dir`.
///
/// Refuses to replace an existing artifact of the same tag unless
/// `overwrite` is set. Transient I/O failures are retried `retries` times;
/// any other failure leaves no file of this tag behind.
pub fn write_dataset(
    out_dir: &Path,
    tag: &str,
    dataset: &Dataset,
    report: &BuildReport,
    overwrite: bool,
    retries: u32,
) -> Result<ArtifactPaths, ArtifactError> {
    let paths = ArtifactPaths::new(out_dir, tag);
    if !overwrite {
        if let Some(existing) = paths.all().into_iter().find(|p| p.exists()) {
            return Err(ArtifactError::Exists(existing.to_path_buf()));
        }
    }
    with_retry(retries, "creating output directory", || {
        fs::create_dir_all(out_dir).map_err(io_error(out_dir))
    })?;

    let (train, test) = dataset.tables();
    let report_json = serde_json::to_vec_pretty(report).map_err(|source| ArtifactError::Json {
        path: paths.report.clone(),
        source,
    })?;
    let contents = [
        (paths.train.as_path(), encode_table(&train, &paths.train)?),
        (paths.test.as_path(), encode_table(&test, &paths.test)?),
        (paths.report.as_path(), report_json),
    ];
    publish_all(&contents, retries)?;
    info!(
        train = %paths.train.display(),
        test = %paths.test.display(),
        report = %paths.report.display(),
        "artifacts written"
    );
    Ok(paths)
}

/// Reads a split artifact back as raw cells. Ragged rows are kept as-is so
/// the validator can report them.
pub fn read_table(split: Split, path: &Path, retries: u32) -> Result<Table, ArtifactError> {
    let csv_error = |source: csv::Error| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };
    with_retry(retries, "reading artifact", || {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(csv_error)?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Table {
            split,
            headers,
            rows,
        })
    })
}
