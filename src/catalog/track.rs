use colored::Colorize;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::tagger::TrackTags;

pub const UNKNOWN_TITLE: &str = "Unknown";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Catalog ids come as JSON strings or numbers depending on the endpoint.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {}",
            other
        ))),
    }
}

pub fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) if id.is_empty() => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {}",
            other
        ))),
    }
}

fn unknown_title() -> String {
    UNKNOWN_TITLE.to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Album {
    #[serde(default)]
    pub title: Option<String>,
}

/// Entry of the liked-tracks library, before the full track is fetched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LikedTrack {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "albumId", default, deserialize_with = "deserialize_optional_id")]
    pub album_id: Option<String>,
}

impl LikedTrack {
    /// Id in the `track:album` form the tracks endpoint accepts.
    pub fn track_ref(&self) -> String {
        match &self.album_id {
            Some(album_id) => format!("{}:{}", self.id, album_id),
            None => self.id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Track {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "albumId", default, deserialize_with = "deserialize_optional_id")]
    pub album_id: Option<String>,
    #[serde(default = "unknown_title")]
    pub title: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub albums: Vec<Album>,
    #[serde(rename = "coverUri", default)]
    pub cover_uri: Option<String>,
    #[serde(rename = "ogImage", default)]
    pub og_image: Option<String>,
}

impl Track {
    pub fn new(id: String, title: String, artists: Vec<&str>) -> Self {
        Track {
            id,
            album_id: None,
            title,
            artists: artists
                .into_iter()
                .map(|name| Artist {
                    name: name.to_string(),
                })
                .collect(),
            albums: vec![],
            cover_uri: None,
            og_image: None,
        }
    }

    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn album_title(&self) -> &str {
        self.albums
            .first()
            .and_then(|album| album.title.as_deref())
            .unwrap_or(UNKNOWN_ALBUM)
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.cover_uri
            .as_deref()
            .or(self.og_image.as_deref())
            .filter(|uri| !uri.is_empty())
    }

    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist_names(), self.title)
    }

    /// Deterministic file name of the synced track. Its existence on disk marks
    /// the track as synced. Control characters are replaced along with `/` and
    /// `:` so the name stays on one line of the MPD protocol.
    pub fn local_filename(&self) -> String {
        let name = self
            .display_name()
            .chars()
            .map(|c| match c {
                '/' | ':' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect::<String>();
        format!("{}.mp3", name)
    }

    pub fn tags(&self) -> TrackTags {
        TrackTags {
            title: self.title.clone(),
            artist: self.artist_names(),
            album: self.album_title().to_string(),
            cover_url: self.cover_url().map(|uri| uri.to_string()),
        }
    }

    pub fn print_already_synced(&self) {
        println!(
            "Track already synced: {}",
            self.display_name().yellow()
        );
    }

    pub fn print_downloading(&self) {
        println!("Downloading: {}", self.display_name().cyan());
    }

    pub fn print_failed(&self) {
        println!(
            "Track {} (ID:{}) could not be synced, skipping",
            self.display_name().red(),
            self.id.clone().red()
        );
    }
}
