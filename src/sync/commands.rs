use colored::Colorize;
use error_stack::ResultExt;
use inflector::Inflector;
use strum::IntoEnumIterator;

use crate::catalog::api::YandexCatalog;
use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::dialoguer::Dialoguer;
use crate::fetcher::TrackFetcher;
use crate::player::mpd::MpdClient;
use crate::player::reconciler::PlaybackReconciler;
use crate::player::{Player, QueuePath};
use crate::resolver::LinkResolver;
use crate::sync::orchestrator::SyncOrchestrator;
use crate::sync::{SyncError, SyncResult};
use crate::tagger::MetadataWriter;

#[derive(Debug, Clone, PartialEq, strum_macros::Display, strum_macros::EnumIter)]
pub enum SyncCommands {
    SyncAndPlayLikes,
    SyncLikesOnly,
}

impl SyncCommands {
    pub const DEFAULT_LIMIT: usize = 100;

    pub async fn execute(config: &AppConfig) -> SyncResult<()> {
        let options = Self::get_options();
        let selection =
            Dialoguer::select("What do you want to do?".to_string(), options, None)
                .change_context(SyncError)?;
        let command = Self::get_selection(selection);
        let answer = Dialoguer::input_allow_empty(format!(
            "Track limit (default {})",
            Self::DEFAULT_LIMIT
        ))
        .change_context(SyncError)?;
        command.run(config, parse_limit(&answer)).await
    }

    fn get_options() -> Vec<String> {
        Self::iter()
            .map(|element| element.to_string().to_sentence_case())
            .collect::<Vec<_>>()
    }

    fn get_selection(selection: usize) -> Self {
        let options = Self::iter().collect::<Vec<_>>();
        options[selection].clone()
    }

    fn plays(&self) -> bool {
        matches!(self, SyncCommands::SyncAndPlayLikes)
    }

    pub async fn run(&self, config: &AppConfig, limit: usize) -> SyncResult<()> {
        let music_dir = config.ensure_music_dir().change_context(SyncError)?;
        log::info!("Syncing to {}", music_dir.display());

        let catalog = YandexCatalog::new(config).change_context(SyncError)?;
        let account = catalog.account().await.change_context(SyncError)?;
        println!("Logged in as {}", account.login.green());

        let mut mpd = MpdClient::new(config.mpd_address());
        if self.plays() {
            if let Err(report) = mpd.connect().await {
                log::warn!(
                    "MPD is not reachable yet, will retry after the sync: {:?}",
                    report
                );
            }
        }

        let tracks = catalog
            .list_liked_tracks(&account.uid, limit)
            .await
            .change_context(SyncError)?;
        if tracks.is_empty() {
            println!("{}", "No tracks found.".yellow());
            return Ok(());
        }
        println!(
            "Found {} liked tracks",
            tracks.len().to_string().cyan()
        );

        let orchestrator = SyncOrchestrator::new(
            LinkResolver::new(catalog.clone()),
            TrackFetcher::new(),
            MetadataWriter::new().change_context(SyncError)?,
            config.music_dir.clone(),
        );
        let report = orchestrator.sync_all(&tracks, limit).await;
        report.print_summary();

        if self.plays() {
            PlaybackReconciler::new(
                &mut mpd,
                QueuePath::policy(&config.mpd_subdirectory),
                config.rescan_grace,
            )
            .reconcile(&report.filenames())
            .await;
        }
        mpd.disconnect().await;
        Ok(())
    }
}

/// Reads the track limit typed at the prompt. Anything but a positive number
/// falls back to the default.
pub fn parse_limit(answer: &str) -> usize {
    match answer.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => limit,
        _ => SyncCommands::DEFAULT_LIMIT,
    }
}
