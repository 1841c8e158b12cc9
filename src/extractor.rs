// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ExtractorError;
use crate::storage::{DEFAULT_AUDIO_EXTENSION, generate_filename_stem, is_valid_audio_extension};

/// A file produced by the extractor, already inside the destination directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    pub local_path: PathBuf,
    /// Title reported by the extractor, when it printed one
    pub title: Option<String>,
}

/// Generic best-effort media downloader addressed by page URL
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Download the best audio for `url` into `dest_dir`
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<ExtractedMedia, ExtractorError>;

    /// Fetch only the title for `url`
    async fn probe(&self, url: &str) -> Result<String, ExtractorError>;
}

/// `MediaExtractor` backed by the `yt-dlp` command-line tool
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: String,
}

impl YtDlpExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: Vec<OsString>) -> Result<String, ExtractorError> {
        debug!(program = %self.program, ?args, "running extractor");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractorError::SpawnFailed {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(ExtractorError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: last_lines(&String::from_utf8_lossy(&output.stderr), 5),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<ExtractedMedia, ExtractorError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| ExtractorError::StagingFailed {
                path: dest_dir.to_path_buf(),
                source: e,
            })?;

        // Removed on drop, which also sweeps up yt-dlp's .part files on failure
        let staging = tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(dest_dir)
            .map_err(|e| ExtractorError::StagingFailed {
                path: dest_dir.to_path_buf(),
                source: e,
            })?;
        let template = staging.path().join("%(id)s.%(ext)s");

        let stdout = self
            .run(vec![
                "-f".into(),
                "bestaudio/best".into(),
                "--no-simulate".into(),
                "--no-playlist".into(),
                "--no-progress".into(),
                "--print".into(),
                "title".into(),
                "--print".into(),
                "after_move:filepath".into(),
                "-o".into(),
                template.into_os_string(),
                url.into(),
            ])
            .await?;

        let printed = parse_print_output(&stdout).ok_or_else(|| ExtractorError::MissingOutput {
            program: self.program.clone(),
            url: url.to_string(),
        })?;

        let extension = printed
            .path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| is_valid_audio_extension(e))
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_AUDIO_EXTENSION.to_string());
        let stem = generate_filename_stem(printed.title.as_deref().unwrap_or("extracted"), url);
        let final_path = dest_dir.join(format!("{stem}.{extension}"));

        tokio::fs::rename(&printed.path, &final_path)
            .await
            .map_err(|e| ExtractorError::StoreFailed {
                path: final_path.clone(),
                source: e,
            })?;

        info!(%url, path = %final_path.display(), "extractor stored audio");

        Ok(ExtractedMedia {
            local_path: final_path,
            title: printed.title,
        })
    }

    async fn probe(&self, url: &str) -> Result<String, ExtractorError> {
        let stdout = self
            .run(vec![
                "--skip-download".into(),
                "--no-playlist".into(),
                "--print".into(),
                "title".into(),
                url.into(),
            ])
            .await?;

        stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(String::from)
            .ok_or_else(|| ExtractorError::MissingOutput {
                program: self.program.clone(),
                url: url.to_string(),
            })
    }
}

#[derive(Debug, PartialEq, Eq)]
struct PrintedOutput {
    title: Option<String>,
    path: PathBuf,
}

/// `--print title --print after_move:filepath` yields the title, then the path
fn parse_print_output(stdout: &str) -> Option<PrintedOutput> {
    let lines: Vec<&str> = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let (path, rest) = lines.split_last()?;
    let title = rest
        .first()
        .map(|t| t.to_string())
        .filter(|t| t != "NA");

    Some(PrintedOutput {
        title,
        path: PathBuf::from(path),
    })
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
