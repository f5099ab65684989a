use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use error_stack::{IntoReport, ResultExt};

#[cfg(feature = "tagging")]
mod id3_tag;

#[derive(Debug)]
pub struct TagError;

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tag error")
    }
}

impl std::error::Error for TagError {}

pub type TagResult<T> = error_stack::Result<T, TagError>;

pub const COVER_SIZE: &str = "600x600";
pub const COVER_SIZE_PLACEHOLDER: &str = "%%";
pub const COVER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_url: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WriteTags: Send + Sync {
    /// Replaces the tag of the file at `path`. Callers treat errors as warnings.
    async fn write_tags(&self, path: &Path, tags: &TrackTags) -> TagResult<()>;
}

/// Cover URLs come with a `%%` size placeholder and without a scheme.
pub fn normalize_cover_url(cover_uri: &str) -> String {
    let cover_uri = cover_uri.replace(COVER_SIZE_PLACEHOLDER, COVER_SIZE);
    if cover_uri.starts_with("https://") || cover_uri.starts_with("http://") {
        cover_uri
    } else {
        format!("https://{}", cover_uri.trim_start_matches('/'))
    }
}

pub struct MetadataWriter {
    client: reqwest::Client,
    missing_support_reported: AtomicBool,
}

impl MetadataWriter {
    pub fn new() -> TagResult<Self> {
        Self::with_cover_timeout(COVER_TIMEOUT)
    }

    /// Cover downloads give up after `cover_timeout`.
    pub fn with_cover_timeout(cover_timeout: Duration) -> TagResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(cover_timeout)
            .build()
            .into_report()
            .attach_printable("Failed to build the cover download client")
            .change_context(TagError)?;
        Ok(Self {
            client,
            missing_support_reported: AtomicBool::new(false),
        })
    }

    pub fn is_supported() -> bool {
        cfg!(feature = "tagging")
    }

    /// Logs the missing tagging support the first time only. Returns whether
    /// this call logged it.
    fn report_missing_support(&self) -> bool {
        if self.missing_support_reported.swap(true, Ordering::SeqCst) {
            return false;
        }
        log::error!(
            "Tagging support is missing, files are synced without tags. Rebuild with: cargo install --features tagging"
        );
        true
    }

    /// Cover failures only end up in the debug log.
    async fn fetch_cover(&self, cover_uri: &str) -> Option<Vec<u8>> {
        let url = normalize_cover_url(cover_uri);
        match self.download_cover(&url).await {
            Ok(data) => Some(data),
            Err(report) => {
                log::debug!("Cover download failed for {}: {:?}", url, report);
                None
            }
        }
    }

    async fn download_cover(&self, url: &str) -> TagResult<Vec<u8>> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .into_report()
            .change_context(TagError)?
            .error_for_status()
            .into_report()
            .change_context(TagError)?
            .bytes()
            .await
            .into_report()
            .change_context(TagError)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl WriteTags for MetadataWriter {
    async fn write_tags(&self, path: &Path, tags: &TrackTags) -> TagResult<()> {
        if !Self::is_supported() {
            self.report_missing_support();
            return Ok(());
        }
        let cover = match &tags.cover_url {
            Some(cover_uri) => self.fetch_cover(cover_uri).await,
            None => None,
        };
        #[cfg(feature = "tagging")]
        {
            let path = path.to_path_buf();
            let tags = tags.clone();
            tokio::task::spawn_blocking(move || id3_tag::write(&path, &tags, cover))
                .await
                .into_report()
                .change_context(TagError)??;
        }
        #[cfg(not(feature = "tagging"))]
        let _ = (path, cover);
        Ok(())
    }
}
