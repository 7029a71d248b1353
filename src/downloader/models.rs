// Common data models for the pipeline

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::PipelineError;

/// Unresolved song identifier exactly as the user (or a list file) supplied it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReference(String);

impl RawReference {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RawReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which lookup path a reference takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Spotify track link, URI or bare 22-character id
    MetadataLink,
    /// YouTube watch URL or bare 11-character id
    VideoLink,
    /// Anything else, searched as text
    FreeText,
}

/// Canonical identity of a song
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SongRecord {
    pub title: String,
    /// `None` when only the video title is known
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub duration_secs: u64,
    pub track_number: Option<u32>,
    pub total_tracks: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<u32>,
    /// 1-based position inside the collection the song was listed from
    pub position: Option<usize>,
    pub cover_url: Option<String>,
    pub provider_url: Option<String>,
    /// Set for records built straight from a video link; skips the locator
    pub video_url: Option<String>,
}

impl SongRecord {
    /// "artist - title", or the bare title when the artist is unknown
    pub fn display_name(&self) -> String {
        match self.artist.as_deref().filter(|a| !a.is_empty()) {
            Some(artist) => format!("{} - {}", artist, self.title),
            None => self.title.clone(),
        }
    }

    /// Text query used on the video platform
    pub fn search_query(&self) -> String {
        match self.artist.as_deref().filter(|a| !a.is_empty()) {
            Some(artist) => format!("{} {}", artist, self.title),
            None => self.title.clone(),
        }
    }

    /// Matching equality: normalized title and normalized artist
    pub fn same_song(&self, other: &SongRecord) -> bool {
        normalize(&self.title) == normalize(&other.title)
            && normalize(self.artist.as_deref().unwrap_or(""))
                == normalize(other.artist.as_deref().unwrap_or(""))
    }
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Video platform search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub duration_secs: u64,
    pub url: String,
    /// 0-based position in the platform's own result order
    pub rank: usize,
}

/// Provider collections that can be expanded into a list file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    Playlist,
    Album,
    User,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playlist => write!(f, "playlist"),
            Self::Album => write!(f, "album"),
            Self::User => write!(f, "user"),
        }
    }
}

/// One track listed by a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub title: String,
    pub artist: Option<String>,
    /// Canonical provider link, absent for local files
    pub link: Option<String>,
}

impl CollectionEntry {
    /// Line written to the list file
    pub fn as_reference(&self) -> RawReference {
        match (&self.link, self.artist.as_deref()) {
            (Some(link), _) => RawReference::new(link.clone()),
            (None, Some(artist)) => RawReference::new(format!("{} - {}", artist, self.title)),
            (None, None) => RawReference::new(self.title.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionPage {
    /// Collection display name; only required on the first page
    pub name: Option<String>,
    pub entries: Vec<CollectionEntry>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub total_tracks: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PlaylistPage {
    pub playlists: Vec<PlaylistSummary>,
    pub next: Option<String>,
}

/// Result of a step that may ask the user to pick
#[derive(Debug, Clone, PartialEq)]
pub enum Choice<T> {
    Picked(T),
    /// Manual choice answered with 0
    Declined,
}

/// Outcome of the metadata step
pub type Resolution = Choice<SongRecord>;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Overwrite policy `skip` and the file is already there
    AlreadyExists(PathBuf),
    /// Overwrite prompt answered with "skip"
    DeclinedOverwrite(PathBuf),
    /// Manual choice answered with 0
    NoChoice,
    /// Dry run: what would have been fetched
    DryRun { title: String, url: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists(path) => write!(f, "{} already exists", path.display()),
            Self::DeclinedOverwrite(path) => write!(f, "kept existing {}", path.display()),
            Self::NoChoice => write!(f, "no choice made"),
            Self::DryRun { title, url } => write!(f, "dry run: {} ({})", title, url),
        }
    }
}

/// Terminal outcome of processing one song
#[derive(Debug, Clone)]
pub enum AcquisitionResult {
    Downloaded(PathBuf),
    Skipped(SkipReason),
    Failed(PipelineError),
}

impl AcquisitionResult {
    /// Whether the backing list entry may be dropped
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Downloaded(_) | Self::Skipped(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    #[default]
    Prompt,
    Force,
    Skip,
}

/// Answer to an overwrite prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    Overwrite,
    Skip,
    Abort,
}

/// Container requested from the video platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputFormat {
    #[default]
    M4a,
    /// Opus in WebM
    Webm,
}

impl InputFormat {
    pub fn ext(&self) -> &'static str {
        match self {
            Self::M4a => ".m4a",
            Self::Webm => ".webm",
        }
    }

    /// yt-dlp format spec, falling back to any audio stream
    pub fn format_spec(&self) -> &'static str {
        match self {
            Self::M4a => "bestaudio[ext=m4a]/bestaudio",
            Self::Webm => "bestaudio[ext=webm]/bestaudio",
        }
    }
}

impl FromStr for InputFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "m4a" => Ok(Self::M4a),
            "webm" => Ok(Self::Webm),
            other => Err(PipelineError::InvalidInput(format!(
                "unsupported input extension: {}",
                other
            ))),
        }
    }
}

/// Final audio format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Mp3,
    /// AAC in an MP4 container
    M4a,
}

impl OutputFormat {
    pub fn ext(&self) -> &'static str {
        match self {
            Self::Mp3 => ".mp3",
            Self::M4a => ".m4a",
        }
    }

    /// Muxer name passed to the transcoder, needed because temp paths have no usable extension
    pub fn muxer(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "ipod",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "m4a" => Ok(Self::M4a),
            other => Err(PipelineError::InvalidInput(format!(
                "unsupported output extension: {}",
                other
            ))),
        }
    }
}

/// Download progress parsed from yt-dlp output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub percent: f32,
    pub status: String,
}

/// Network configuration for backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Socket timeout in seconds handed to yt-dlp
    pub timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
        }
    }
}

/// Counters reported at the end of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Stopped early on an explicit user abort
    pub aborted: bool,
}

impl BatchSummary {
    pub fn record(&mut self, result: &AcquisitionResult) {
        match result {
            AcquisitionResult::Downloaded(_) => self.downloaded += 1,
            AcquisitionResult::Skipped(_) => self.skipped += 1,
            AcquisitionResult::Failed(_) => self.failed += 1,
        }
    }
}
