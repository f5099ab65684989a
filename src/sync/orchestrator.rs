use std::path::{Path, PathBuf};

use colored::Colorize;
use error_stack::{AttachmentKind, FrameKind, Report, ResultExt};

use crate::catalog::track::Track;
use crate::fetcher::FetchTrack;
use crate::resolver::ResolveLink;
use crate::sync::{SkipReason, SyncError, SyncOutcome, SyncReport, SyncResult, TrackSync};
use crate::tagger::WriteTags;

/// Runs resolve, fetch and tag for each liked track, one track at a time.
pub struct SyncOrchestrator<R, F, T> {
    resolver: R,
    fetcher: F,
    tagger: T,
    music_dir: PathBuf,
}

impl<R, F, T> SyncOrchestrator<R, F, T>
where
    R: ResolveLink,
    F: FetchTrack,
    T: WriteTags,
{
    pub fn new(resolver: R, fetcher: F, tagger: T, music_dir: PathBuf) -> Self {
        Self {
            resolver,
            fetcher,
            tagger,
            music_dir,
        }
    }

    /// Syncs the first `limit` tracks in list order. A failing track is
    /// recorded and the pass moves on to the next one.
    pub async fn sync_all(&self, tracks: &[Track], limit: usize) -> SyncReport {
        let tracks = &tracks[..limit.min(tracks.len())];
        let total_tracks = tracks.len();
        let mut report = SyncReport::default();

        for (track_index, track) in tracks.iter().enumerate() {
            println!(
                "Processing track {} of {}",
                (track_index + 1).to_string().cyan(),
                total_tracks.to_string().cyan()
            );
            report.tracks.push(self.sync_track(track).await);
        }
        report
    }

    pub async fn sync_track(&self, track: &Track) -> TrackSync {
        let filename = track.local_filename();
        let local_path = self.music_dir.join(&filename);

        if local_path.exists() {
            track.print_already_synced();
            return TrackSync {
                track_id: track.id.clone(),
                local_filename: Some(filename),
                outcome: SyncOutcome::Skipped(SkipReason::AlreadyExists),
            };
        }

        track.print_downloading();
        if let Err(report) = self.download(track, &local_path).await {
            log::error!("Failed to sync track {}: {:?}", track.title, report);
            remove_leftover(&local_path);
            track.print_failed();
            return TrackSync {
                track_id: track.id.clone(),
                local_filename: None,
                outcome: SyncOutcome::Failed(failure_reason(&report)),
            };
        }

        if let Err(report) = self.tagger.write_tags(&local_path, &track.tags()).await {
            log::warn!(
                "Failed to write tags for {}, keeping the file untagged: {:?}",
                filename,
                report
            );
        }

        TrackSync {
            track_id: track.id.clone(),
            local_filename: Some(filename),
            outcome: SyncOutcome::Success,
        }
    }

    async fn download(&self, track: &Track, local_path: &Path) -> SyncResult<()> {
        let url = self
            .resolver
            .resolve(&track.id)
            .await
            .change_context(SyncError)?;
        self.fetcher
            .fetch(&url, local_path)
            .await
            .change_context(SyncError)?;
        if !local_path.exists() {
            return Err(Report::new(SyncError).attach_printable(format!(
                "Download finished but {} is missing",
                local_path.display()
            )));
        }
        Ok(())
    }
}

/// Every context of the report plus its printable attachments, e.g.
/// `Sync error: Resolve error (no download info)`.
fn failure_reason(report: &Report<SyncError>) -> String {
    let details = report
        .frames()
        .filter_map(|frame| match frame.kind() {
            FrameKind::Attachment(AttachmentKind::Printable(attachment)) => {
                Some(attachment.to_string())
            }
            _ => None,
        })
        .collect::<Vec<_>>();
    if details.is_empty() {
        format!("{:#}", report)
    } else {
        format!("{:#} ({})", report, details.join("; "))
    }
}

fn remove_leftover(local_path: &Path) {
    if local_path.exists() {
        if let Err(err) = std::fs::remove_file(local_path) {
            log::warn!("Could not remove {}: {}", local_path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use error_stack::Report;
    use mockall::predicate::eq;
    use url::Url;

    use super::*;
    use crate::fetcher::{FetchError, MockFetchTrack};
    use crate::resolver::{MockResolveLink, ResolveError};
    use crate::tagger::{MockWriteTags, TagError};

    fn track(id: &str, artist: &str, title: &str) -> Track {
        Track::new(id.to_string(), title.to_string(), vec![artist])
    }

    fn link_for(track_id: &str) -> Url {
        Url::parse(&format!(
            "https://storage.example/get-mp3/sign/ts/{}",
            track_id
        ))
        .unwrap()
    }

    fn resolving_resolver() -> MockResolveLink {
        let mut resolver = MockResolveLink::new();
        resolver
            .expect_resolve()
            .returning(|track_id| Ok(link_for(track_id)));
        resolver
    }

    fn writing_fetcher() -> MockFetchTrack {
        let mut fetcher = MockFetchTrack::new();
        fetcher.expect_fetch().returning(|url, destination| {
            fs::write(destination, url.as_str()).unwrap();
            Ok(())
        });
        fetcher
    }

    fn accepting_tagger() -> MockWriteTags {
        let mut tagger = MockWriteTags::new();
        tagger.expect_write_tags().returning(|_, _| Ok(()));
        tagger
    }

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_existing_file_is_skipped_and_new_one_downloaded() {
        let temp = tempfile::tempdir().unwrap();
        let tracks = vec![track("1", "Old", "Song"), track("2", "New", "Song")];
        fs::write(temp.path().join("Old - Song.mp3"), b"synced earlier").unwrap();

        let mut resolver = MockResolveLink::new();
        resolver
            .expect_resolve()
            .with(eq("2"))
            .times(1)
            .returning(|track_id| Ok(link_for(track_id)));
        let mut fetcher = MockFetchTrack::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|url, destination| {
                fs::write(destination, url.as_str()).unwrap();
                Ok(())
            });
        let mut tagger = MockWriteTags::new();
        tagger
            .expect_write_tags()
            .withf(|path, tags| path.ends_with("New - Song.mp3") && tags.artist == "New")
            .times(1)
            .returning(|_, _| Ok(()));

        let orchestrator =
            SyncOrchestrator::new(resolver, fetcher, tagger, temp.path().to_path_buf());
        let before = file_count(temp.path());
        let report = orchestrator.sync_all(&tracks, 100).await;

        assert_eq!(report.filenames(), vec!["Old - Song.mp3", "New - Song.mp3"]);
        assert_eq!(
            report.tracks[0].outcome,
            SyncOutcome::Skipped(SkipReason::AlreadyExists)
        );
        assert_eq!(report.tracks[1].outcome, SyncOutcome::Success);
        assert_eq!(file_count(temp.path()), before + 1);
    }

    #[tokio::test]
    async fn test_second_pass_makes_no_network_calls() {
        let temp = tempfile::tempdir().unwrap();
        let tracks = vec![track("1", "A", "One"), track("2", "B", "Two")];

        let first = SyncOrchestrator::new(
            resolving_resolver(),
            writing_fetcher(),
            accepting_tagger(),
            temp.path().to_path_buf(),
        );
        let first_report = first.sync_all(&tracks, 100).await;

        let mut resolver = MockResolveLink::new();
        resolver.expect_resolve().never();
        let mut fetcher = MockFetchTrack::new();
        fetcher.expect_fetch().never();
        let mut tagger = MockWriteTags::new();
        tagger.expect_write_tags().never();
        let second = SyncOrchestrator::new(resolver, fetcher, tagger, temp.path().to_path_buf());
        let second_report = second.sync_all(&tracks, 100).await;

        assert_eq!(first_report.filenames(), second_report.filenames());
        assert_eq!(second_report.skipped(), 2);
    }

    #[tokio::test]
    async fn test_failing_resolve_does_not_stop_the_batch() {
        let temp = tempfile::tempdir().unwrap();
        let tracks = vec![
            track("1", "A", "One"),
            track("2", "B", "Two"),
            track("3", "C", "Three"),
        ];

        let mut resolver = MockResolveLink::new();
        resolver.expect_resolve().returning(|track_id| {
            if track_id == "2" {
                Err(Report::new(ResolveError).attach_printable("no download info"))
            } else {
                Ok(link_for(track_id))
            }
        });
        let orchestrator = SyncOrchestrator::new(
            resolver,
            writing_fetcher(),
            accepting_tagger(),
            temp.path().to_path_buf(),
        );
        let report = orchestrator.sync_all(&tracks, 100).await;

        assert_eq!(report.tracks.len(), 3);
        match &report.tracks[1].outcome {
            SyncOutcome::Failed(reason) => {
                assert!(reason.contains("Resolve error"), "{}", reason);
                assert!(reason.contains("no download info"), "{}", reason);
            }
            outcome => panic!("expected a failure, got {:?}", outcome),
        }
        assert_eq!(report.tracks[1].local_filename, None);
        assert_eq!(report.filenames(), vec!["A - One.mp3", "C - Three.mp3"]);
        assert!(!temp.path().join("B - Two.mp3").exists());
    }

    #[tokio::test]
    async fn test_failing_fetch_leaves_no_file() {
        let temp = tempfile::tempdir().unwrap();
        let tracks = vec![track("1", "A", "One")];

        let mut fetcher = MockFetchTrack::new();
        fetcher.expect_fetch().returning(|_, destination| {
            fs::write(destination, b"truncated").unwrap();
            Err(Report::new(FetchError))
        });
        let mut tagger = MockWriteTags::new();
        tagger.expect_write_tags().never();

        let orchestrator = SyncOrchestrator::new(
            resolving_resolver(),
            fetcher,
            tagger,
            temp.path().to_path_buf(),
        );
        let report = orchestrator.sync_all(&tracks, 100).await;

        assert_eq!(report.failed(), 1);
        assert!(report.filenames().is_empty());
        assert_eq!(file_count(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_tagging_failure_keeps_track() {
        let temp = tempfile::tempdir().unwrap();
        let tracks = vec![track("1", "A", "One")];

        let mut tagger = MockWriteTags::new();
        tagger
            .expect_write_tags()
            .returning(|_, _| Err(Report::new(TagError)));

        let orchestrator = SyncOrchestrator::new(
            resolving_resolver(),
            writing_fetcher(),
            tagger,
            temp.path().to_path_buf(),
        );
        let report = orchestrator.sync_all(&tracks, 100).await;

        assert_eq!(report.tracks[0].outcome, SyncOutcome::Success);
        assert!(temp.path().join("A - One.mp3").exists());
    }

    #[tokio::test]
    async fn test_limit_truncates_tracks() {
        let temp = tempfile::tempdir().unwrap();
        let tracks = vec![
            track("1", "A", "One"),
            track("2", "B", "Two"),
            track("3", "C", "Three"),
        ];

        let orchestrator = SyncOrchestrator::new(
            resolving_resolver(),
            writing_fetcher(),
            accepting_tagger(),
            temp.path().to_path_buf(),
        );
        let report = orchestrator.sync_all(&tracks, 2).await;

        assert_eq!(report.filenames(), vec!["A - One.mp3", "B - Two.mp3"]);
        assert_eq!(file_count(temp.path()), 2);
    }
}
