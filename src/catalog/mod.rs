use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::track::Track;

pub mod api;
pub mod track;

#[derive(Debug)]
pub struct CatalogError;

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Catalog error")
    }
}

impl std::error::Error for CatalogError {}

pub type CatalogResult<T> = error_stack::Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub uid: String,
    pub login: String,
}

/// An encoding the catalog offers for a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    pub codec: String,
    #[serde(rename = "bitrateInKbps")]
    pub bitrate_in_kbps: u32,
    #[serde(rename = "downloadInfoUrl")]
    pub download_info_url: String,
}

/// Fields of the download-info document the direct link is signed from.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SigningPayload {
    pub host: String,
    pub path: String,
    pub ts: String,
    pub s: String,
    #[serde(default)]
    pub region: Option<String>,
}

impl fmt::Debug for SigningPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningPayload")
            .field("host", &self.host)
            .field("path", &self.path)
            .field("ts", &self.ts)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// The catalog capabilities the sync pipeline relies on.
///
/// `api::YandexCatalog` talks to the real service, tests use the generated mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    async fn account(&self) -> CatalogResult<Account>;

    /// Full track objects for the first `limit` liked tracks, newest like first.
    async fn list_liked_tracks(&self, user_id: &str, limit: usize) -> CatalogResult<Vec<Track>>;

    async fn get_download_descriptors(
        &self,
        track_id: &str,
    ) -> CatalogResult<Vec<DownloadDescriptor>>;

    async fn resolve_signing_payload(&self, info_url: &str) -> CatalogResult<SigningPayload>;
}
