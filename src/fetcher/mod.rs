use std::fmt;
use std::path::{Path, PathBuf};

use colored::Colorize;
use error_stack::{IntoReport, Report, ResultExt};
use futures_util::{pin_mut, Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use url::Url;

#[derive(Debug)]
pub struct FetchError;

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fetch error")
    }
}

impl std::error::Error for FetchError {}

pub type FetchResult<T> = error_stack::Result<T, FetchError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FetchTrack: Send + Sync {
    /// Downloads `url` into `destination`. Nothing is left at `destination`
    /// when this fails.
    async fn fetch(&self, url: &Url, destination: &Path) -> FetchResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct TrackFetcher {
    client: reqwest::Client,
}

impl TrackFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn progress_bar(total_size: Option<u64>, file_name: &str) -> FetchResult<ProgressBar> {
        let pb = match total_size {
            Some(total_size) => ProgressBar::new(total_size),
            None => ProgressBar::new_spinner(),
        };
        pb.set_style(ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.white/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})").into_report().change_context(FetchError)?
            .progress_chars("█  "));
        pb.set_message(format!("Downloading {}", file_name.to_string().cyan()));
        Ok(pb)
    }
}

#[async_trait::async_trait]
impl FetchTrack for TrackFetcher {
    async fn fetch(&self, url: &Url, destination: &Path) -> FetchResult<()> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .into_report()
            .change_context(FetchError)?
            .error_for_status()
            .into_report()
            .change_context(FetchError)?;

        let file_name = destination
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let pb = Self::progress_bar(response.content_length(), &file_name)?;
        let result = store_stream(response.bytes_stream(), destination, &pb).await;
        match &result {
            Ok(written) => {
                log::debug!("{} bytes written to {}", written, destination.display());
                pb.finish_with_message(format!("{} successfully downloaded", file_name.green()));
            }
            Err(_) => pb.abandon_with_message(format!("{} failed", file_name.red())),
        }
        result.map(|_| ())
    }
}

/// Sibling file the body is streamed into before it is renamed into place.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut file_name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    file_name.push(".part");
    destination.with_file_name(file_name)
}

/// Writes every chunk of `stream` to the partial file, then renames it onto
/// `destination`. The partial file is removed on any failure.
pub async fn store_stream<S, B, E>(
    stream: S,
    destination: &Path,
    pb: &ProgressBar,
) -> FetchResult<u64>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: error_stack::Context,
{
    let partial = partial_path(destination);
    let result = write_partial(stream, &partial, pb).await;
    let result = match result {
        Ok(written) => fs::rename(&partial, destination)
            .await
            .into_report()
            .attach_printable(format!("Failed to move download to {}", destination.display()))
            .change_context(FetchError)
            .map(|_| written),
        Err(report) => Err(report),
    };
    if result.is_err() && fs::metadata(&partial).await.is_ok() {
        if let Err(err) = fs::remove_file(&partial).await {
            log::warn!(
                "Could not remove partial download {}: {}",
                partial.display(),
                err
            );
        }
    }
    result
}

async fn write_partial<S, B, E>(stream: S, partial: &Path, pb: &ProgressBar) -> FetchResult<u64>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: error_stack::Context,
{
    pin_mut!(stream);
    let mut dest = File::create(partial)
        .await
        .into_report()
        .attach_printable(format!("Failed to create {}", partial.display()))
        .change_context(FetchError)?;
    let mut downloaded: u64 = 0;
    while let Some(item) = stream.next().await {
        let chunk = item.into_report().change_context(FetchError)?;
        let chunk = chunk.as_ref();
        dest.write_all(chunk)
            .await
            .into_report()
            .change_context(FetchError)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    dest.flush().await.into_report().change_context(FetchError)?;
    if downloaded == 0 {
        return Err(Report::new(FetchError).attach_printable("Download returned an empty body"));
    }
    Ok(downloaded)
}
