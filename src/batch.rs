// The upload loop. Files are discovered once, then sent one after another
// over a single sender. Transport and HTTP status failures stop the batch;
// unreadable files and bad acknowledgements only cost the current file.

use crate::api::{FilePart, HttpSender, Sender};
use crate::config::UploaderConfig;
use crate::error::{Severity, UploadError};
use crate::response::accepted_path;
use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CONSOLE_PREFIX: &str = "Data Collection:";

/// Print one status line on the console channel.
pub fn say<W: Write>(out: &mut W, msg: impl Display) {
    // A closed stdout must not abort an upload in flight.
    let _ = writeln!(out, "{} {}", CONSOLE_PREFIX, msg);
}

/// A file the server accepted, with the path it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub file: PathBuf,
    pub server_path: String,
}

/// What happened during one run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Requests actually put on the wire.
    pub attempts: usize,
    pub uploaded: Vec<Receipt>,
    /// Fatal-to-file errors, in the order they happened.
    pub skipped: Vec<UploadError>,
    /// The fatal-to-batch error, if the run stopped early.
    pub aborted: Option<UploadError>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

/// List regular files in `dir` matching `pattern`, in the order the glob
/// walk yields them. Hidden files need an explicit leading dot.
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let dir_str = dir
        .to_str()
        .with_context(|| format!("Directory {:?} is not valid UTF-8", dir))?;
    let full = if dir_str == "." {
        format!("./{}", pattern)
    } else {
        format!("{}/{}", Pattern::escape(dir_str.trim_end_matches('/')), pattern)
    };

    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let entries = glob::glob_with(&full, options)
        .with_context(|| format!("Invalid file pattern {:?}", pattern))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(path) => log::debug!("Ignoring non-file match {}", path.display()),
            Err(err) => log::warn!("Unreadable entry while scanning {}: {}", dir.display(), err),
        }
    }
    log::debug!("Discovered {} file(s) matching {}", files.len(), full);
    Ok(files)
}

/// Upload every file in `files` through `sender`, writing status lines to
/// `out`. Returns as soon as a fatal-to-batch error occurs.
pub fn upload_all<S, W>(sender: &mut S, files: &[PathBuf], out: &mut W) -> BatchReport
where
    S: Sender,
    W: Write,
{
    let mut report = BatchReport::default();

    for path in files {
        say(out, format_args!("Sending file [{}]", path.display()));

        let part = match FilePart::open(path) {
            Ok(part) => part,
            Err(source) => {
                let err = UploadError::CreateFailed {
                    path: path.clone(),
                    source,
                };
                say(out, &err);
                report.skipped.push(err);
                continue;
            }
        };

        report.attempts += 1;
        match upload_one(sender, path, part) {
            Ok(server_path) => {
                say(
                    out,
                    format_args!("Uploaded file [{}] to [{}]", path.display(), server_path),
                );
                report.uploaded.push(Receipt {
                    file: path.clone(),
                    server_path,
                });
            }
            Err(err) => {
                say(out, &err);
                match err.severity() {
                    Severity::File => report.skipped.push(err),
                    Severity::Batch => {
                        log::warn!(
                            "Aborting batch at {} after {} attempt(s)",
                            err.path().display(),
                            report.attempts
                        );
                        report.aborted = Some(err);
                        return report;
                    }
                }
            }
        }
    }

    report
}

fn upload_one<S: Sender>(sender: &mut S, path: &Path, part: FilePart) -> Result<String, UploadError> {
    let reply = sender.send(part).map_err(|err| UploadError::Transport {
        path: path.to_path_buf(),
        kind: err.kind,
        message: err.message,
    })?;

    if reply.status != 200 {
        return Err(UploadError::HttpStatus {
            path: path.to_path_buf(),
            status: reply.status,
        });
    }

    accepted_path(&reply.body).ok_or_else(|| UploadError::InvalidResponse {
        path: path.to_path_buf(),
        body: reply.body,
    })
}

/// Run a full batch against the configured endpoint.
pub fn run<W: Write>(config: &UploaderConfig, out: &mut W) -> Result<BatchReport> {
    run_with(config, out, HttpSender::new)
}

/// Like `run`, but with the sender supplied by `connect`. The sender is only
/// created when there is something to upload and is dropped before the
/// completion message, on every path.
pub fn run_with<S, W, F>(config: &UploaderConfig, out: &mut W, connect: F) -> Result<BatchReport>
where
    S: Sender,
    W: Write,
    F: FnOnce(&UploaderConfig) -> Result<S>,
{
    let files = discover(&config.directory, &config.pattern)?;

    let report = if files.is_empty() {
        BatchReport::default()
    } else {
        let mut sender = connect(config)?;
        if let Some(addr) = config.proxy() {
            say(out, format_args!("Using proxy [{}]", addr));
        }
        upload_all(&mut sender, &files, out)
    };

    if report.is_complete() {
        say(out, "Completed");
    }
    Ok(report)
}
