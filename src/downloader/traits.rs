// Collaborator traits the pipeline is wired against

use std::path::Path;

use async_trait::async_trait;

use super::errors::PipelineError;
use super::models::{
    Candidate, CollectionKind, CollectionPage, InputFormat, OutputFormat, OverwriteDecision,
    PlaylistPage, SongRecord,
};

/// Song metadata provider (Spotify)
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    /// Fetch one track by its opaque id
    async fn track(&self, id: &str) -> Result<SongRecord, PipelineError>;

    /// Free-text track search, best match first
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SongRecord>, PipelineError>;

    /// One page of a playlist or album listing; `cursor` is the previous page's `next`
    async fn collection_page(
        &self,
        kind: CollectionKind,
        id: &str,
        cursor: Option<&str>,
    ) -> Result<CollectionPage, PipelineError>;

    /// One page of a user's public playlists
    async fn user_playlists_page(
        &self,
        user: &str,
        cursor: Option<&str>,
    ) -> Result<PlaylistPage, PipelineError>;
}

/// Video platform used as the audio source (YouTube through yt-dlp)
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ranked search hits; `music_only` restricts to the music catalogue
    async fn search(
        &self,
        query: &str,
        music_only: bool,
        limit: usize,
    ) -> Result<Vec<Candidate>, PipelineError>;

    /// Title and duration of a single video
    async fn video_info(&self, url: &str) -> Result<Candidate, PipelineError>;

    /// Fetch the audio stream of `url` into `dest`
    async fn download_audio(
        &self,
        url: &str,
        format: InputFormat,
        dest: &Path,
    ) -> Result<(), PipelineError>;
}

/// External transcoding tool
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcode(
        &self,
        input: &Path,
        input_format: InputFormat,
        output: &Path,
        output_format: OutputFormat,
    ) -> Result<(), PipelineError>;
}

/// Interactive choices injected into the resolver, locator and acquisition engine
pub trait Chooser: Send + Sync {
    /// Pick one of `options`; `None` means the user entered 0
    fn choose(&self, prompt: &str, options: &[String]) -> Option<usize>;

    /// Ask what to do about an existing output file
    fn confirm_overwrite(&self, path: &Path) -> OverwriteDecision;
}
