use std::path::{Path, PathBuf};

use futures::StreamExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::DownloadError;
use crate::http::{HttpClient, RequestOptions};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::filename::generate_filename;

/// An audio file in the store plus the URL it is served under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAudioAsset {
    pub path: PathBuf,
    pub filename: String,
    pub public_url: String,
    /// `sha256:<hex>` of the downloaded body; absent for extractor output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// The audio storage directory and its public URL prefix
#[derive(Debug, Clone)]
pub struct AudioStore {
    root: PathBuf,
    public_prefix: String,
}

impl AudioStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage directory if it is missing
    pub async fn ensure_exists(&self) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DownloadError::CreateDirectoryFailed {
                path: self.root.clone(),
                source: e,
            })
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), filename)
    }

    /// Describe a file some other tool already placed on disk
    pub fn asset_for_local(&self, path: PathBuf) -> StoredAudioAsset {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        StoredAudioAsset {
            public_url: self.public_url(&filename),
            filename,
            path,
            content_hash: None,
        }
    }
}

/// Removes the `.partial` file unless the download was committed
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Stream `url` into the store under a name derived from title and id.
///
/// The body goes to `<name>.partial` first and is renamed into place once fully
/// written, so an existing file of the same name is replaced only by a complete
/// download. With `options.read_timeout` set, a body that goes quiet for that
/// long fails with `DownloadError::Stalled`.
pub async fn download_to_store<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    title: &str,
    id: &str,
    store: &AudioStore,
    options: RequestOptions,
    reporter: &SharedProgressReporter,
) -> Result<StoredAudioAsset, DownloadError> {
    let filename = generate_filename(title, id);
    let output_path = store.path_for(&filename);
    let partial_path = store.path_for(&format!("{filename}.partial"));

    store.ensure_exists().await?;

    let response = client
        .get_stream(url, options)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        title: title.to_string(),
        content_length: response.content_length,
    });
    debug!(%url, path = %output_path.display(), "downloading audio");

    let mut guard = PartialFile {
        path: partial_path.clone(),
        committed: false,
    };

    let mut file =
        File::create(&partial_path)
            .await
            .map_err(|e| DownloadError::FileCreateFailed {
                path: partial_path.clone(),
                source: e,
            })?;

    let mut hasher = Sha256::new();
    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    loop {
        let next = match options.read_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| DownloadError::Stalled {
                    url: url.to_string(),
                    after: limit,
                })?,
            None => stream.next().await,
        };
        let Some(chunk_result) = next else {
            break;
        };

        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial_path.clone(),
                source: e,
            })?;

        hasher.update(&chunk);
        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: partial_path.clone(),
            source: e,
        })?;
    drop(file);

    tokio::fs::rename(&partial_path, &output_path)
        .await
        .map_err(|e| DownloadError::RenameFailed {
            from: partial_path.clone(),
            to: output_path.clone(),
            source: e,
        })?;
    guard.committed = true;

    let content_hash = format!("sha256:{:x}", hasher.finalize());
    info!(%filename, bytes = bytes_downloaded, %content_hash, "audio stored");

    reporter.report(ProgressEvent::DownloadCompleted {
        filename: filename.clone(),
        bytes: bytes_downloaded,
    });

    Ok(StoredAudioAsset {
        public_url: store.public_url(&filename),
        filename,
        path: output_path,
        content_hash: Some(content_hash),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopReporter;
    use crate::test_support::MockHttpClient;

    use std::time::Duration;
    use tempfile::tempdir;

    fn options() -> RequestOptions {
        RequestOptions::download(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn download_writes_file_with_generated_name() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "/audio");
        let client = MockHttpClient::new().with("https://x/a.mp3", "test audio content");

        let asset = download_to_store(
            &client,
            "https://x/a.mp3",
            "Ep: 1/2?!",
            "abc",
            &store,
            options(),
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(asset.filename, "Ep_12_90015098.mp3");
        assert_eq!(asset.public_url, "/audio/Ep_12_90015098.mp3");
        assert_eq!(asset.path, dir.path().join("Ep_12_90015098.mp3"));
        assert_eq!(std::fs::read(&asset.path).unwrap(), b"test audio content");
        assert!(!dir.path().join("Ep_12_90015098.mp3.partial").exists());
    }

    #[tokio::test]
    async fn download_reports_sha256_of_body() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "/audio");
        let client = MockHttpClient::new().with("https://x/a.mp3", "abc");

        let asset = download_to_store(&client, "https://x/a.mp3", "T", "id", &store, options(), &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(
            asset.content_hash.as_deref(),
            Some("sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[tokio::test]
    async fn download_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "/audio");
        std::fs::write(dir.path().join("T_b80bb774.mp3"), b"stale").unwrap();
        let client = MockHttpClient::new().with("https://x/a.mp3", "fresh");

        let asset = download_to_store(&client, "https://x/a.mp3", "T", "id", &store, options(), &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(asset.filename, "T_b80bb774.mp3");
        assert_eq!(std::fs::read(&asset.path).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn download_creates_missing_store_directory() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path().join("nested/audio"), "/audio/");
        let client = MockHttpClient::new().with("https://x/a.mp3", "data");

        let asset = download_to_store(&client, "https://x/a.mp3", "T", "id", &store, options(), &NoopReporter::shared())
            .await
            .unwrap();

        assert!(asset.path.exists());
        assert_eq!(asset.public_url, format!("/audio/{}", asset.filename));
    }

    #[tokio::test]
    async fn download_fails_on_http_error_without_leaving_files() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "/audio");
        let client = MockHttpClient::new().with_status("https://x/a.mp3", 404, "Not Found");

        let result =
            download_to_store(&client, "https://x/a.mp3", "T", "id", &store, options(), &NoopReporter::shared()).await;

        match result.unwrap_err() {
            DownloadError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn download_fails_on_transport_error() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "/audio");
        let client = MockHttpClient::new().failing("https://x/a.mp3");

        let result =
            download_to_store(&client, "https://x/a.mp3", "T", "id", &store, options(), &NoopReporter::shared()).await;

        assert!(matches!(result, Err(DownloadError::HttpFailed { .. })));
    }

    #[tokio::test]
    async fn stream_error_mid_body_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "/audio");
        let client = MockHttpClient::new().with_broken_stream("https://x/a.mp3", "first half");

        let result =
            download_to_store(&client, "https://x/a.mp3", "T", "id", &store, options(), &NoopReporter::shared()).await;

        assert!(matches!(result, Err(DownloadError::StreamFailed { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn stream_error_keeps_previous_copy() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "/audio");
        std::fs::write(dir.path().join("T_b80bb774.mp3"), b"good copy").unwrap();
        let client = MockHttpClient::new().with_broken_stream("https://x/a.mp3", "partial");

        let result =
            download_to_store(&client, "https://x/a.mp3", "T", "id", &store, options(), &NoopReporter::shared()).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(dir.path().join("T_b80bb774.mp3")).unwrap(), b"good copy");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn stalled_body_fails_after_read_timeout() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "/audio");
        let client = MockHttpClient::new().with_stalled_stream("https://x/a.mp3", "abc");
        let read_timeout = Duration::from_millis(100);

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            download_to_store(
                &client,
                "https://x/a.mp3",
                "T",
                "id",
                &store,
                RequestOptions::download(read_timeout),
                &NoopReporter::shared(),
            ),
        )
        .await
        .expect("download must not hang");

        match result.unwrap_err() {
            DownloadError::Stalled { after, .. } => assert_eq!(after, read_timeout),
            other => panic!("Expected Stalled error, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn download_passes_request_options_to_client() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "/audio");
        let client = MockHttpClient::new().with("https://x/a.mp3", "data");

        download_to_store(&client, "https://x/a.mp3", "T", "id", &store, options(), &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(client.options_for("https://x/a.mp3"), Some(options()));
    }

    #[test]
    fn partial_guard_removes_uncommitted_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.mp3.partial");
        std::fs::write(&path, b"half").unwrap();

        drop(PartialFile {
            path: path.clone(),
            committed: false,
        });

        assert!(!path.exists());
    }

    #[test]
    fn asset_for_local_uses_basename() {
        let store = AudioStore::new("/srv/audio", "/audio");
        let asset = store.asset_for_local(PathBuf::from("/srv/audio/Show_1234abcd.m4a"));

        assert_eq!(asset.filename, "Show_1234abcd.m4a");
        assert_eq!(asset.public_url, "/audio/Show_1234abcd.m4a");
        assert!(asset.content_hash.is_none());
    }
}
