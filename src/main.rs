use std::fmt;

use clap::{Parser, Subcommand};
use colored::Colorize;
use error_stack::fmt::{Charset, ColorMode};
use error_stack::{FutureExt, Report, ResultExt};

use crate::config::AppConfig;
use crate::sync::commands::SyncCommands;

mod catalog;
mod config;
mod dialoguer;
mod fetcher;
mod player;
mod resolver;
mod sync;
mod tagger;

#[derive(Debug)]
pub struct YaMusicError;
impl fmt::Display for YaMusicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("YaMusic MPD error")
    }
}
impl std::error::Error for YaMusicError {}

pub type YaMusicResult<T> = error_stack::Result<T, YaMusicError>;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Sync Yandex Music likes and play them with MPD")]
struct Cli {
    #[command(subcommand)]
    command: Option<YaMusicCommands>,
}

/// Without a subcommand an interactive menu is shown
#[derive(Subcommand, Debug, PartialEq, Clone)]
enum YaMusicCommands {
    /// Download liked tracks that are not synced yet and queue them in MPD
    Sync {
        /// Maximum number of liked tracks to sync
        #[clap(long, short)]
        limit: Option<usize>,
        /// Only sync the files, leave the MPD queue untouched
        #[clap(long, action)]
        no_play: bool,
    },
    /// Reads the current config
    Config,
}

impl YaMusicCommands {
    pub async fn execute(&self, config: AppConfig) -> YaMusicResult<()> {
        return match self {
            YaMusicCommands::Sync { limit, no_play } => {
                let command = if *no_play {
                    SyncCommands::SyncLikesOnly
                } else {
                    SyncCommands::SyncAndPlayLikes
                };
                let limit = limit
                    .filter(|limit| *limit > 0)
                    .unwrap_or(SyncCommands::DEFAULT_LIMIT);
                command
                    .run(&config, limit)
                    .change_context(YaMusicError)
                    .await
            }
            YaMusicCommands::Config => {
                println!("Current config:\n{:#?}", config);
                Ok(())
            }
        };
    }
}

pub struct Suggestion(String);

impl Suggestion {
    pub fn set_report() {
        Report::set_charset(Charset::Utf8);
        Report::set_color_mode(ColorMode::Color);
        Report::install_debug_hook::<Self>(|Self(value), context| {
            context.push_body(format!("{}: {value}", "suggestion".yellow()))
        });
    }
}

async fn run() -> YaMusicResult<()> {
    let cli = Cli::parse();

    Suggestion::set_report();

    let config = AppConfig::from_env().change_context(YaMusicError)?;
    match cli.command {
        Some(command) => command.execute(config).await,
        None => SyncCommands::execute(&config)
            .change_context(YaMusicError)
            .await,
    }
}

#[tokio::main]
async fn main() -> YaMusicResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    tokio::select! {
        result = run() => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", "Interrupted by user.".yellow());
            Ok(())
        }
    }
}
