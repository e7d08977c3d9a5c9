//! Batch runner that instruments files and directories.
//!
//! Every file is an independent invocation of [`instrument_source`], so files
//! are processed in parallel with no ordering between them.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::instrument::{instrument_source, FunctionStatus, InstrumentReport};

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["vendor", "node_modules", "target", "build"];

/// Where instrumented text goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Return the text to the caller; the CLI prints it.
    Stdout,
    /// Overwrite each input file that changed.
    InPlace,
    /// Mirror the input tree under this directory.
    Directory(PathBuf),
}

/// Result for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    #[serde(flatten)]
    pub report: InstrumentReport,
    /// File the output was written to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<PathBuf>,
    /// Instrumented text, kept only in stdout mode.
    #[serde(skip)]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Results for a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub files: Vec<FileResult>,
}

impl BatchResult {
    pub fn instrumented_functions(&self) -> usize {
        self.files
            .iter()
            .map(|f| f.report.count(FunctionStatus::Instrumented))
            .sum()
    }

    pub fn inserted(&self) -> usize {
        self.files.iter().map(|f| f.report.inserted()).sum()
    }

    pub fn changed_files(&self) -> usize {
        self.files.iter().filter(|f| f.report.changed()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    pub fn has_warnings(&self) -> bool {
        self.files.iter().any(|f| f.report.has_warnings())
    }
}

/// Instruments a set of files with one configuration.
pub struct Runner {
    config: Config,
    output: OutputMode,
    progress: bool,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            output: OutputMode::Stdout,
            progress: false,
        }
    }

    /// Set where instrumented text goes.
    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Show a progress bar on stderr when it is a terminal.
    pub fn progress(mut self, show: bool) -> Self {
        self.progress = show;
        self
    }

    /// Source files under `root`. A file root is returned as is.
    pub fn collect_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if root.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                // Skip hidden and third-party directories
                !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
            })
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if !self.config.has_source_extension(path) || self.config.is_path_excluded(relative) {
                continue;
            }
            files.push(path.to_path_buf());
        }
        Ok(files)
    }

    /// Instrument `files`, all found under `root`.
    pub fn run(&self, root: &Path, files: &[PathBuf]) -> BatchResult {
        let bar = if self.progress && files.len() > 1 && std::io::stderr().is_terminal() {
            let bar = ProgressBar::new(files.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let files: Vec<FileResult> = files
            .par_iter()
            .map(|path| {
                bar.set_message(path.display().to_string());
                let result = match self.process_file(root, path) {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "file failed");
                        FileResult {
                            path: path.clone(),
                            report: InstrumentReport::new(),
                            written: None,
                            text: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                bar.inc(1);
                result
            })
            .collect();
        bar.finish_and_clear();

        BatchResult { files }
    }

    /// Instrument one file and write its output.
    pub fn process_file(&self, root: &Path, path: &Path) -> Result<FileResult> {
        let bytes = fs::read(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let source = String::from_utf8_lossy(&bytes);
        let result = instrument_source(&source, &self.config);
        debug!(
            path = %path.display(),
            functions = result.report.functions.len(),
            inserted = result.report.inserted(),
            "processed"
        );

        let mut written = None;
        let mut text = None;
        match &self.output {
            OutputMode::Stdout => text = Some(result.text),
            OutputMode::InPlace => {
                if result.text != source {
                    write_file(path, &result.text)?;
                    written = Some(path.to_path_buf());
                }
            }
            OutputMode::Directory(dir) => {
                let dest = dir.join(mirrored_path(root, path));
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|source| Error::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                write_file(&dest, &result.text)?;
                written = Some(dest);
            }
        }

        Ok(FileResult {
            path: path.to_path_buf(),
            report: result.report,
            written,
            text,
            error: None,
        })
    }
}

/// Path of `path` relative to `root`; the file name when `root` is the file.
fn mirrored_path(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
        _ => path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf()),
    }
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}
