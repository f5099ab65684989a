use std::fmt;

use colored::Colorize;

pub mod commands;
pub mod orchestrator;

#[derive(Debug)]
pub struct SyncError;

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sync error")
    }
}

impl std::error::Error for SyncError {}

pub type SyncResult<T> = error_stack::Result<T, SyncError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success,
    Skipped(SkipReason),
    Failed(String),
}

/// What happened to one track during a sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSync {
    pub track_id: String,
    pub local_filename: Option<String>,
    pub outcome: SyncOutcome,
}

impl TrackSync {
    pub fn is_synced(&self) -> bool {
        matches!(
            self.outcome,
            SyncOutcome::Success | SyncOutcome::Skipped(_)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub tracks: Vec<TrackSync>,
}

impl SyncReport {
    /// File names of the tracks that are on disk after the pass, in list order.
    pub fn filenames(&self) -> Vec<String> {
        self.tracks
            .iter()
            .filter(|track| track.is_synced())
            .filter_map(|track| track.local_filename.clone())
            .collect()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|outcome| matches!(outcome, SyncOutcome::Success))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, SyncOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, SyncOutcome::Failed(_)))
    }

    fn count<F: Fn(&SyncOutcome) -> bool>(&self, predicate: F) -> usize {
        self.tracks
            .iter()
            .filter(|track| predicate(&track.outcome))
            .count()
    }

    pub fn print_summary(&self) {
        println!(
            "\n{}: Downloaded {} tracks, {} already synced, {} failed",
            "Sync complete".green(),
            self.downloaded().to_string().cyan(),
            self.skipped().to_string().yellow(),
            self.failed().to_string().red()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_sync(id: &str, outcome: SyncOutcome) -> TrackSync {
        let local_filename = match outcome {
            SyncOutcome::Failed(_) => None,
            _ => Some(format!("{}.mp3", id)),
        };
        TrackSync {
            track_id: id.to_string(),
            local_filename,
            outcome,
        }
    }

    #[test]
    fn test_report_counts_and_filenames() {
        let report = SyncReport {
            tracks: vec![
                track_sync("1", SyncOutcome::Success),
                track_sync("2", SyncOutcome::Failed("resolve".to_string())),
                track_sync("3", SyncOutcome::Skipped(SkipReason::AlreadyExists)),
            ],
        };
        assert_eq!(report.filenames(), vec!["1.mp3", "3.mp3"]);
        assert_eq!(report.downloaded(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
    }
}
