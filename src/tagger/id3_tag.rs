use std::path::Path;

use error_stack::{IntoReport, ResultExt};
use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};

use crate::tagger::{TagError, TagResult, TrackTags};

const COVER_MIME_TYPE: &str = "image/jpeg";
const COVER_DESCRIPTION: &str = "Cover";

/// Writes a fresh ID3v2.3 tag, dropping whatever tag the file had before.
/// v2.3 is what most MPD clients read reliably.
pub(super) fn write(path: &Path, tags: &TrackTags, cover: Option<Vec<u8>>) -> TagResult<()> {
    let mut tag = Tag::new();
    tag.set_title(tags.title.as_str());
    tag.set_artist(tags.artist.as_str());
    tag.set_album(tags.album.as_str());
    if let Some(data) = cover {
        tag.add_frame(Picture {
            mime_type: COVER_MIME_TYPE.to_string(),
            picture_type: PictureType::CoverFront,
            description: COVER_DESCRIPTION.to_string(),
            data,
        });
    }

    Tag::remove_from_path(path)
        .into_report()
        .attach_printable(format!("Failed to remove old tag from {}", path.display()))
        .change_context(TagError)?;
    tag.write_to_path(path, Version::Id3v23)
        .into_report()
        .attach_printable(format!("Failed to write tag to {}", path.display()))
        .change_context(TagError)
}
