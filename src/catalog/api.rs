use error_stack::{IntoReport, Report, ResultExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::catalog::track::{LikedTrack, Track};
use crate::catalog::{
    Account, Catalog, CatalogError, CatalogResult, DownloadDescriptor, SigningPayload,
};
use crate::config::AppConfig;
use crate::Suggestion;

pub enum CatalogAPI {
    AccountStatus,
    LikedTracks { user_id: String },
    Tracks,
    DownloadInfo { track_id: String },
}

impl CatalogAPI {
    pub fn url(&self, base_url: &str) -> String {
        match self {
            CatalogAPI::AccountStatus => format!("{}/account/status", base_url),
            CatalogAPI::LikedTracks { user_id } => {
                format!("{}/users/{}/likes/tracks", base_url, user_id)
            }
            CatalogAPI::Tracks => format!("{}/tracks", base_url),
            CatalogAPI::DownloadInfo { track_id } => {
                format!("{}/tracks/{}/download-info", base_url, track_id)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct AccountStatus {
    account: AccountInfo,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    #[serde(deserialize_with = "crate::catalog::track::deserialize_id")]
    uid: String,
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
struct LikesLibrary {
    library: LikedTracks,
}

#[derive(Debug, Deserialize)]
struct LikedTracks {
    #[serde(default)]
    tracks: Vec<LikedTrack>,
}

/// HTTP client for the Yandex Music API.
#[derive(Debug, Clone)]
pub struct YandexCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl YandexCatalog {
    pub fn new(config: &AppConfig) -> CatalogResult<Self> {
        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(&format!("OAuth {}", config.token))
            .into_report()
            .attach_printable("The OAuth token contains characters not allowed in a header")
            .change_context(CatalogError)?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(
            "x-yandex-music-client",
            HeaderValue::from_static(AppConfig::CLIENT_ID),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .into_report()
            .change_context(CatalogError)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> CatalogResult<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .into_report()
            .attach_printable(format!("Request to {} failed", url))
            .change_context(CatalogError)?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> CatalogResult<T> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Report::new(CatalogError)
                .attach_printable(format!("Catalog rejected the token: {}", response.url()))
                .attach(Suggestion(
                    "the YAMUSIC_TOKEN is invalid or expired, get a new OAuth token".to_string(),
                )));
        }
        let response = response
            .error_for_status()
            .into_report()
            .change_context(CatalogError)?;
        let body: ApiResponse<T> = response
            .json()
            .await
            .into_report()
            .attach_printable("Failed to parse the catalog response")
            .change_context(CatalogError)?;
        Ok(body.result)
    }
}

#[async_trait::async_trait]
impl Catalog for YandexCatalog {
    async fn account(&self) -> CatalogResult<Account> {
        let status: AccountStatus = self
            .get_json(&CatalogAPI::AccountStatus.url(&self.base_url))
            .await?;
        Ok(Account {
            uid: status.account.uid,
            login: status.account.login,
        })
    }

    async fn list_liked_tracks(&self, user_id: &str, limit: usize) -> CatalogResult<Vec<Track>> {
        let api = CatalogAPI::LikedTracks {
            user_id: user_id.to_string(),
        };
        let likes: LikesLibrary = self.get_json(&api.url(&self.base_url)).await?;
        let track_refs = likes
            .library
            .tracks
            .iter()
            .take(limit)
            .map(LikedTrack::track_ref)
            .collect::<Vec<_>>();
        if track_refs.is_empty() {
            return Ok(vec![]);
        }

        let url = CatalogAPI::Tracks.url(&self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("track-ids", track_refs.join(","))])
            .send()
            .await
            .into_report()
            .attach_printable(format!("Request to {} failed", url))
            .change_context(CatalogError)?;
        Self::parse_response(response).await
    }

    async fn get_download_descriptors(
        &self,
        track_id: &str,
    ) -> CatalogResult<Vec<DownloadDescriptor>> {
        let api = CatalogAPI::DownloadInfo {
            track_id: track_id.to_string(),
        };
        self.get_json(&api.url(&self.base_url)).await
    }

    async fn resolve_signing_payload(&self, info_url: &str) -> CatalogResult<SigningPayload> {
        let body = self
            .client
            .get(info_url)
            .send()
            .await
            .into_report()
            .change_context(CatalogError)?
            .error_for_status()
            .into_report()
            .change_context(CatalogError)?
            .text()
            .await
            .into_report()
            .change_context(CatalogError)?;
        parse_signing_payload(&body)
    }
}

pub fn parse_signing_payload(xml: &str) -> CatalogResult<SigningPayload> {
    quick_xml::de::from_str(xml)
        .into_report()
        .attach_printable("Failed to parse the download-info document")
        .change_context(CatalogError)
}
