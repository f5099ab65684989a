use std::fmt;

pub mod mpd;
pub mod reconciler;

#[derive(Debug)]
pub struct PlayerError;

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Player error")
    }
}

impl std::error::Error for PlayerError {}

pub type PlayerResult<T> = error_stack::Result<T, PlayerError>;

/// Queue-oriented control of the playback daemon.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Player: Send {
    async fn connect(&mut self) -> PlayerResult<()>;

    async fn ping(&mut self) -> PlayerResult<()>;

    /// Asks the daemon to rescan its music library.
    async fn rescan(&mut self) -> PlayerResult<()>;

    async fn clear_queue(&mut self) -> PlayerResult<()>;

    /// Fails when the daemon does not know `path`.
    async fn enqueue(&mut self, path: &str) -> PlayerResult<()>;

    async fn play_from(&mut self, position: usize) -> PlayerResult<()>;

    async fn disconnect(&mut self);
}

/// One way of naming a synced file in the daemon's library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuePath {
    /// `<subdirectory>/<file>`, for a daemon whose music root contains the sync folder.
    MediaSubdirectory(String),
    /// `<file>`, for a daemon whose music root is the sync folder itself.
    BareFilename,
}

impl QueuePath {
    pub fn path_for(&self, filename: &str) -> String {
        match self {
            QueuePath::MediaSubdirectory(subdirectory) if !subdirectory.is_empty() => {
                format!("{}/{}", subdirectory, filename)
            }
            QueuePath::MediaSubdirectory(_) | QueuePath::BareFilename => filename.to_string(),
        }
    }

    /// Attempts in the order they are tried. Without a subdirectory only the
    /// bare filename is tried.
    pub fn policy(subdirectory: &str) -> Vec<QueuePath> {
        let mut attempts = vec![];
        if !subdirectory.is_empty() {
            attempts.push(QueuePath::MediaSubdirectory(subdirectory.to_string()));
        }
        attempts.push(QueuePath::BareFilename);
        attempts
    }
}
