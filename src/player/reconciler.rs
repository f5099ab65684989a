use std::time::Duration;

use colored::Colorize;
use error_stack::ResultExt;

use crate::player::{Player, PlayerResult, QueuePath};

/// Makes the daemon's queue match the files of a sync pass and starts playback.
pub struct PlaybackReconciler<'a, P: Player> {
    player: &'a mut P,
    attempts: Vec<QueuePath>,
    rescan_grace: Duration,
}

impl<'a, P: Player> PlaybackReconciler<'a, P> {
    pub fn new(player: &'a mut P, attempts: Vec<QueuePath>, rescan_grace: Duration) -> Self {
        Self {
            player,
            attempts,
            rescan_grace,
        }
    }

    /// Same as [`Self::push_and_play`], but any player failure is logged and
    /// swallowed. Returns the number of queued tracks on success.
    pub async fn reconcile(&mut self, filenames: &[String]) -> Option<usize> {
        match self.push_and_play(filenames).await {
            Ok(queued) => Some(queued),
            Err(report) => {
                log::error!("Failed to update the MPD queue: {:?}", report);
                None
            }
        }
    }

    /// Replaces the queue with `filenames` (in order) and plays from the first
    /// one. Files the daemon does not know under any queue path are left out.
    pub async fn push_and_play(&mut self, filenames: &[String]) -> PlayerResult<usize> {
        self.ensure_connected().await?;

        println!("{}", "Updating MPD library...".cyan());
        self.player
            .rescan()
            .await
            .attach_printable("Failed to start the library rescan")?;
        if !self.rescan_grace.is_zero() {
            tokio::time::sleep(self.rescan_grace).await;
        }
        self.player
            .clear_queue()
            .await
            .attach_printable("Failed to clear the queue")?;

        let mut queued = 0;
        for filename in filenames {
            if self.enqueue_first_known(filename).await {
                queued += 1;
            } else {
                log::warn!("MPD does not know {}, leaving it out of the queue", filename);
            }
        }

        if queued == 0 {
            if filenames.is_empty() {
                log::info!("No synced tracks, nothing to queue in MPD");
            } else {
                log::error!(
                    "None of the {} synced tracks could be queued. Check music_directory in mpd.conf, it must contain the sync folder",
                    filenames.len()
                );
            }
            return Ok(0);
        }

        self.player
            .play_from(0)
            .await
            .attach_printable("Failed to start playback")?;
        println!(
            "{} Added {} tracks",
            "Playback started!".green(),
            queued.to_string().cyan()
        );
        Ok(queued)
    }

    async fn ensure_connected(&mut self) -> PlayerResult<()> {
        if self.player.ping().await.is_ok() {
            return Ok(());
        }
        log::debug!("MPD did not answer ping, reconnecting");
        self.player
            .connect()
            .await
            .attach_printable("MPD is unreachable")
    }

    async fn enqueue_first_known(&mut self, filename: &str) -> bool {
        for attempt in &self.attempts {
            let path = attempt.path_for(filename);
            match self.player.enqueue(&path).await {
                Ok(()) => return true,
                Err(report) => log::debug!("MPD rejected {}: {:?}", path, report),
            }
        }
        false
    }
}
