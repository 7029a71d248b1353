// Run configuration built once from the command line

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::Options;
use crate::downloader::acquisition::AcquisitionConfig;
use crate::downloader::backends::SpotifyCredentials;
use crate::downloader::errors::PipelineError;
use crate::downloader::locator::LocatorConfig;
use crate::downloader::models::{
    CollectionKind, InputFormat, NetworkConfig, OutputFormat, OverwritePolicy,
};
use crate::downloader::tools::ToolType;

/// What this invocation does
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Mode {
    Song(String),
    List(PathBuf),
    Collection { url: String, kind: CollectionKind },
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub mode: Mode,
    pub folder: PathBuf,
    pub list_dir: PathBuf,
    pub manual: bool,
    pub overwrite: OverwritePolicy,
    pub input: InputFormat,
    pub output: OutputFormat,
    pub want_metadata: bool,
    pub dry_run: bool,
    pub music_only: bool,
    pub transcoder: ToolType,
    pub max_duration_delta: Option<u64>,
    pub retries: u32,
    pub network: NetworkConfig,
    pub credentials: SpotifyCredentials,
    pub log_level: String,
}

impl Config {
    pub fn from_options(options: Options) -> Result<Self, PipelineError> {
        let mode = match (options.song, options.list, options.playlist, options.album, options.username) {
            (Some(song), ..) => Mode::Song(song),
            (_, Some(list), ..) => Mode::List(list),
            (_, _, Some(url), ..) => Mode::Collection {
                url,
                kind: CollectionKind::Playlist,
            },
            (_, _, _, Some(url), _) => Mode::Collection {
                url,
                kind: CollectionKind::Album,
            },
            (_, _, _, _, Some(url)) => Mode::Collection {
                url,
                kind: CollectionKind::User,
            },
            _ => {
                return Err(PipelineError::InvalidInput(
                    "one of --song, --list, --playlist, --album or --username is required".into(),
                ))
            }
        };

        Ok(Self {
            mode,
            folder: options.folder.unwrap_or_else(default_folder),
            list_dir: options.list_dir.unwrap_or_else(|| PathBuf::from(".")),
            manual: options.manual,
            overwrite: options.overwrite,
            input: options.input_ext,
            output: options.output_ext,
            want_metadata: !options.no_metadata,
            dry_run: options.dry_run,
            music_only: options.music_videos_only,
            transcoder: if options.avconv {
                ToolType::Avconv
            } else {
                ToolType::Ffmpeg
            },
            max_duration_delta: options.max_duration_delta,
            retries: options.retries,
            network: NetworkConfig {
                proxy: options.proxy.filter(|p| !p.trim().is_empty()),
                ..Default::default()
            },
            credentials: SpotifyCredentials::new(options.client_id, options.client_secret),
            log_level: options.log_level,
        })
    }

    pub fn acquisition(&self) -> AcquisitionConfig {
        AcquisitionConfig::new(&self.folder)
            .with_overwrite(self.overwrite)
            .with_formats(self.input, self.output)
            .with_metadata(self.want_metadata)
            .with_dry_run(self.dry_run)
            .with_retries(self.retries)
    }

    pub fn locator(&self) -> LocatorConfig {
        LocatorConfig::default()
            .with_music_only(self.music_only)
            .with_manual(self.manual)
            .with_max_duration_delta(self.max_duration_delta)
    }
}

/// The platform music directory, else `./Music`
pub fn default_folder() -> PathBuf {
    dirs::audio_dir().unwrap_or_else(|| PathBuf::from("Music"))
}
