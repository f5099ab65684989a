use std::fmt;

use error_stack::{IntoReport, Report, ResultExt};
use md5::{Digest, Md5};
use url::Url;

use crate::catalog::{Catalog, DownloadDescriptor, SigningPayload};

#[derive(Debug)]
pub struct ResolveError;

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resolve error")
    }
}

impl std::error::Error for ResolveError {}

pub type ResolveResult<T> = error_stack::Result<T, ResolveError>;

/// Salt of the direct-link signature. Public and fixed by the storage service.
pub const SIGN_SALT: &str = "XGRlBW9FXlekgbPrRHuSiA";
pub const PREFERRED_CODEC: &str = "mp3";
pub const PREFERRED_BITRATE_KBPS: u32 = 320;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ResolveLink: Send + Sync {
    /// Signed, time-limited download URL for the track.
    async fn resolve(&self, track_id: &str) -> ResolveResult<Url>;
}

pub struct LinkResolver<C> {
    catalog: C,
}

impl<C: Catalog> LinkResolver<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }
}

#[async_trait::async_trait]
impl<C: Catalog> ResolveLink for LinkResolver<C> {
    async fn resolve(&self, track_id: &str) -> ResolveResult<Url> {
        let descriptors = self
            .catalog
            .get_download_descriptors(track_id)
            .await
            .change_context(ResolveError)
            .attach_printable(format!("Failed to get download info for track {}", track_id))?;
        let descriptor = select_descriptor(&descriptors).ok_or_else(|| {
            Report::new(ResolveError)
                .attach_printable(format!("No download options for track {}", track_id))
        })?;
        log::debug!(
            "Track {}: using {} {}kbps",
            track_id,
            descriptor.codec,
            descriptor.bitrate_in_kbps
        );
        let payload = self
            .catalog
            .resolve_signing_payload(&descriptor.download_info_url)
            .await
            .change_context(ResolveError)?;
        direct_link(&payload)
    }
}

/// Prefers mp3 at 320kbps, otherwise takes whatever the catalog lists first.
pub fn select_descriptor(descriptors: &[DownloadDescriptor]) -> Option<&DownloadDescriptor> {
    descriptors
        .iter()
        .find(|descriptor| {
            descriptor.codec == PREFERRED_CODEC
                && descriptor.bitrate_in_kbps == PREFERRED_BITRATE_KBPS
        })
        .or_else(|| descriptors.first())
}

/// MD5 over salt, path without its leading slash and the server nonce.
/// The storage host verifies exactly this digest.
pub fn sign(path: &str, nonce: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(SIGN_SALT.as_bytes());
    hasher.update(path.trim_start_matches('/').as_bytes());
    hasher.update(nonce.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn direct_link(payload: &SigningPayload) -> ResolveResult<Url> {
    let path = payload.path.trim_start_matches('/');
    let link = format!(
        "https://{}/get-mp3/{}/{}/{}",
        payload.host,
        sign(&payload.path, &payload.s),
        payload.ts,
        path
    );
    Url::parse(&link)
        .into_report()
        .attach_printable(format!("Invalid download host: {}", payload.host))
        .change_context(ResolveError)
}

#[cfg(test)]
mod tests {
    use error_stack::Report;
    use mockall::predicate::eq;

    use super::*;
    use crate::catalog::{CatalogError, MockCatalog};

    fn descriptor(codec: &str, bitrate: u32, url: &str) -> DownloadDescriptor {
        DownloadDescriptor {
            codec: codec.to_string(),
            bitrate_in_kbps: bitrate,
            download_info_url: url.to_string(),
        }
    }

    fn payload() -> SigningPayload {
        SigningPayload {
            host: "s123vla.storage.yandex.net".to_string(),
            path: "/rmusic/U2FsdGVkX1-example/trackpath".to_string(),
            ts: "0005f1a2b3c4d".to_string(),
            s: "abc123nonce".to_string(),
            region: None,
        }
    }

    #[test]
    fn test_sign_matches_reference_digest() {
        assert_eq!(
            sign("/rmusic/U2FsdGVkX1-example/trackpath", "abc123nonce"),
            "1136eed0b7aa581919c67cc8a0669cee"
        );
        assert_eq!(
            sign("rmusic/U2FsdGVkX19vcmlnaW5hbA/4e7d2b9a1c3f", "5d0c1a2b3e4f"),
            "1f2eae6f0cfcaba348d7031116288ac1"
        );
    }

    #[test]
    fn test_direct_link() {
        let url = direct_link(&payload()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://s123vla.storage.yandex.net/get-mp3/1136eed0b7aa581919c67cc8a0669cee/0005f1a2b3c4d/rmusic/U2FsdGVkX1-example/trackpath"
        );
    }

    #[test]
    fn test_select_prefers_mp3_320() {
        let descriptors = vec![
            descriptor("aac", 64, "a"),
            descriptor("mp3", 192, "b"),
            descriptor("mp3", 320, "c"),
        ];
        assert_eq!(
            select_descriptor(&descriptors).unwrap().download_info_url,
            "c"
        );
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let descriptors = vec![descriptor("aac", 64, "a"), descriptor("mp3", 192, "b")];
        assert_eq!(
            select_descriptor(&descriptors).unwrap().download_info_url,
            "a"
        );
        assert!(select_descriptor(&[]).is_none());
    }

    #[tokio::test]
    async fn test_resolve_uses_preferred_descriptor() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_download_descriptors()
            .with(eq("12345"))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    descriptor("aac", 192, "https://storage/aac"),
                    descriptor("mp3", 320, "https://storage/mp3"),
                ])
            });
        catalog
            .expect_resolve_signing_payload()
            .with(eq("https://storage/mp3"))
            .times(1)
            .returning(|_| Ok(payload()));

        let resolver = LinkResolver::new(catalog);
        let url = resolver.resolve("12345").await.unwrap();
        assert_eq!(url.host_str(), Some("s123vla.storage.yandex.net"));
        assert!(url.path().starts_with("/get-mp3/1136eed0b7aa581919c67cc8a0669cee/"));
    }

    #[tokio::test]
    async fn test_resolve_without_descriptors_fails() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_download_descriptors()
            .returning(|_| Ok(vec![]));
        catalog.expect_resolve_signing_payload().never();

        let resolver = LinkResolver::new(catalog);
        assert!(resolver.resolve("12345").await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_propagates_catalog_failure() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_download_descriptors()
            .returning(|_| Ok(vec![descriptor("mp3", 320, "https://storage/mp3")]));
        catalog
            .expect_resolve_signing_payload()
            .returning(|_| Err(Report::new(CatalogError)));

        let resolver = LinkResolver::new(catalog);
        let report = resolver.resolve("12345").await.unwrap_err();
        assert!(report.contains::<CatalogError>());
    }
}
