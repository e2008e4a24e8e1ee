use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{
    api::ApiClient,
    domain::{AppError, Lecture},
    utils::{extension_from_url, sanitize_filename, sanitize_path},
};

/// Transfer capability used by the session for each video lecture.
#[async_trait]
pub trait LectureFetcher: Send + Sync {
    /// `true` only when the asset has been completely written to disk.
    async fn fetch(&self, lecture: &Lecture) -> bool;
}

/// Resolves and downloads a hosted-platform stream into `directory`,
/// choosing the extension itself.
#[async_trait]
pub trait StreamDownloader: Send + Sync {
    async fn download(&self, url: &str, directory: &Path, stem: &str) -> Result<(), AppError>;
}

/// Delegates streamed videos to the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl StreamDownloader for YtDlp {
    async fn download(&self, url: &str, directory: &Path, stem: &str) -> Result<(), AppError> {
        let template = directory.join(format!("{}.%(ext)s", stem));
        let status = Command::new(&self.program)
            .arg("--no-playlist")
            .arg("-o")
            .arg(&template)
            .arg(url)
            .status()
            .await
            .map_err(|e| AppError::TransferFailure(format!("Failed to run {}: {}", self.program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(AppError::TransferFailure(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}

#[derive(Clone)]
pub struct DownloadEngine {
    api_client: ApiClient,
    streams: Arc<dyn StreamDownloader>,
}

impl DownloadEngine {
    pub fn new(api_client: ApiClient) -> Self {
        Self {
            api_client,
            streams: Arc::new(YtDlp::default()),
        }
    }

    pub fn with_stream_downloader(mut self, streams: Arc<dyn StreamDownloader>) -> Self {
        self.streams = streams;
        self
    }

    async fn try_fetch(&self, lecture: &Lecture) -> Result<bool, AppError> {
        let url = lecture
            .download_url
            .as_deref()
            .ok_or_else(|| AppError::TransferFailure(format!("{} has no download url", lecture.url)))?;
        let destination = lecture
            .destination_path
            .as_deref()
            .ok_or_else(|| AppError::TransferFailure(format!("{} has no destination", lecture.url)))?;

        let directory = sanitize_path(destination);
        let stem = sanitize_filename(&lecture.file_stem());
        debug!("Saving {} to {}", stem, directory.display());
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| AppError::Io(format!("Failed to create {}: {}", directory.display(), e)))?;

        if lecture.is_streamed_video {
            self.streams.download(url, &directory, &stem).await?;
            return Ok(true);
        }

        if !self.is_downloadable(url).await? {
            warn!(url, "download url serves a page, not a file");
            return Ok(false);
        }

        let path = directory.join(format!("{}.{}", stem, extension_from_url(url)));
        if let Err(e) = self.write_file(url, &path).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
        Ok(true)
    }

    /// Text or HTML usually means the session expired and we got a login page.
    async fn is_downloadable(&self, url: &str) -> Result<bool, AppError> {
        let content_type = self.api_client.content_type(url).await?;
        Ok(match content_type {
            Some(value) => {
                let value = value.to_ascii_lowercase();
                !(value.contains("text") || value.contains("html"))
            }
            None => true,
        })
    }

    async fn write_file(&self, url: &str, path: &Path) -> Result<u64, AppError> {
        let (total, stream) = self.api_client.download_file_stream(url).await?;
        let mut stream = Box::pin(stream);

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| AppError::Io(format!("Failed to create file: {}", e)))?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::Io(format!("Write error: {}", e)))?;
            written += chunk.len() as u64;
        }

        file.sync_all()
            .await
            .map_err(|e| AppError::Io(format!("Failed to sync file: {}", e)))?;

        if let Some(total) = total {
            if written != total {
                return Err(AppError::TransferFailure(format!(
                    "expected {} bytes, wrote {}",
                    total, written
                )));
            }
        }

        debug!(bytes = written, path = %path.display(), "file written");
        Ok(written)
    }
}

#[async_trait]
impl LectureFetcher for DownloadEngine {
    async fn fetch(&self, lecture: &Lecture) -> bool {
        match self.try_fetch(lecture).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(url = %lecture.url, error = %e, "lecture transfer failed");
                false
            }
        }
    }
}
