// Command-line options

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::downloader::models::{InputFormat, OutputFormat, OverwritePolicy};

#[derive(Parser, Debug, Clone)]
#[command(name = "trackdl")]
#[command(about = "Resolve songs from Spotify links or search text and save them as tagged audio files")]
#[command(version)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["song", "list", "playlist", "album", "username"])
))]
pub struct Options {
    /// Download a single song: Spotify link, YouTube link or search text
    #[arg(short, long)]
    pub song: Option<String>,

    /// Download every song in a list file, one reference per line
    #[arg(short, long)]
    pub list: Option<PathBuf>,

    /// Write a Spotify playlist's tracks to a list file
    #[arg(short, long)]
    pub playlist: Option<String>,

    /// Write a Spotify album's tracks to a list file
    #[arg(short = 'b', long)]
    pub album: Option<String>,

    /// Choose one of a Spotify user's playlists and write it to a list file
    #[arg(short, long)]
    pub username: Option<String>,

    /// Choose the song and the video from numbered lists
    #[arg(short, long)]
    pub manual: bool,

    /// Do not embed tags or cover art
    #[arg(long)]
    pub no_metadata: bool,

    /// Transcode with avconv instead of ffmpeg
    #[arg(short, long)]
    pub avconv: bool,

    /// Output folder [default: the user's music directory]
    #[arg(short, long)]
    pub folder: Option<PathBuf>,

    /// What to do when the output file already exists
    #[arg(long, value_enum, default_value_t = OverwritePolicy::Prompt)]
    pub overwrite: OverwritePolicy,

    /// Audio stream to download (.m4a or .webm)
    #[arg(short, long = "input-ext", default_value = ".m4a")]
    pub input_ext: InputFormat,

    /// Final audio format (.mp3 or .m4a)
    #[arg(short, long = "output-ext", default_value = ".mp3")]
    pub output_ext: OutputFormat,

    /// Show what would be downloaded without touching any file
    #[arg(short, long)]
    pub dry_run: bool,

    /// Only search the music catalogue, not every video
    #[arg(long)]
    pub music_videos_only: bool,

    /// Log verbosity; RUST_LOG takes precedence
    #[arg(
        long,
        default_value = "info",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    pub log_level: String,

    /// Reject videos whose duration differs from the song's by more than this many seconds
    #[arg(long)]
    pub max_duration_delta: Option<u64>,

    /// Extra attempts after a failed download or transcode
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Proxy for Spotify and yt-dlp (e.g. socks5://127.0.0.1:1080)
    #[arg(long, env = "TRACKDL_PROXY")]
    pub proxy: Option<String>,

    /// Where collection list files are written [default: current directory]
    #[arg(long)]
    pub list_dir: Option<PathBuf>,

    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true, default_value = "")]
    pub client_id: String,

    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true, default_value = "")]
    pub client_secret: String,
}
