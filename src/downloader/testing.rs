// In-memory collaborators for pipeline tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::errors::PipelineError;
use super::models::{
    Candidate, CollectionKind, CollectionPage, InputFormat, OutputFormat, OverwriteDecision,
    PlaylistPage, SongRecord,
};
use super::traits::{Chooser, MetadataProvider, Transcoder, VideoPlatform};

pub fn song(title: &str, artist: Option<&str>, duration_secs: u64) -> SongRecord {
    SongRecord {
        title: title.to_string(),
        artist: artist.map(str::to_string),
        duration_secs,
        ..Default::default()
    }
}

pub fn candidate(title: &str, duration_secs: u64, rank: usize) -> Candidate {
    Candidate {
        title: title.to_string(),
        duration_secs,
        url: format!("https://www.youtube.com/watch?v={}", title.replace(' ', "_")),
        rank,
    }
}

#[derive(Default)]
pub struct FakeProvider {
    pub tracks: HashMap<String, SongRecord>,
    pub searches: HashMap<String, Vec<SongRecord>>,
    /// keyed by (id, cursor)
    pub pages: HashMap<(String, Option<String>), CollectionPage>,
    pub user_pages: HashMap<(String, Option<String>), PlaylistPage>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn with_track(mut self, id: &str, song: SongRecord) -> Self {
        self.tracks.insert(id.to_string(), song);
        self
    }

    pub fn with_search(mut self, query: &str, results: Vec<SongRecord>) -> Self {
        self.searches.insert(query.to_string(), results);
        self
    }

    pub fn with_page(mut self, id: &str, cursor: Option<&str>, page: CollectionPage) -> Self {
        self.pages
            .insert((id.to_string(), cursor.map(str::to_string)), page);
        self
    }

    pub fn with_user_page(mut self, user: &str, cursor: Option<&str>, page: PlaylistPage) -> Self {
        self.user_pages
            .insert((user.to_string(), cursor.map(str::to_string)), page);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake-provider"
    }

    async fn track(&self, id: &str) -> Result<SongRecord, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tracks
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SongRecord>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut results = self.searches.get(query).cloned().unwrap_or_default();
        results.truncate(limit);
        Ok(results)
    }

    async fn collection_page(
        &self,
        _kind: CollectionKind,
        id: &str,
        cursor: Option<&str>,
    ) -> Result<CollectionPage, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(&(id.to_string(), cursor.map(str::to_string)))
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("collection {}", id)))
    }

    async fn user_playlists_page(
        &self,
        user: &str,
        cursor: Option<&str>,
    ) -> Result<PlaylistPage, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.user_pages
            .get(&(user.to_string(), cursor.map(str::to_string)))
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("user {}", user)))
    }
}

#[derive(Default)]
pub struct FakePlatform {
    pub results: HashMap<String, Vec<Candidate>>,
    pub infos: HashMap<String, Candidate>,
    pub failing_downloads: HashSet<String>,
    /// Every call, as "search:<query>", "info:<url>" or "download:<url>"
    pub log: Mutex<Vec<String>>,
}

impl FakePlatform {
    pub fn with_results(mut self, query: &str, results: Vec<Candidate>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }

    pub fn with_info(mut self, url: &str, info: Candidate) -> Self {
        self.infos.insert(url.to_string(), info);
        self
    }

    pub fn failing_download(mut self, url: &str) -> Self {
        self.failing_downloads.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl VideoPlatform for FakePlatform {
    fn name(&self) -> &'static str {
        "fake-platform"
    }

    async fn search(
        &self,
        query: &str,
        _music_only: bool,
        limit: usize,
    ) -> Result<Vec<Candidate>, PipelineError> {
        self.record(format!("search:{}", query));
        let mut results = self.results.get(query).cloned().unwrap_or_default();
        results.truncate(limit);
        Ok(results)
    }

    async fn video_info(&self, url: &str) -> Result<Candidate, PipelineError> {
        self.record(format!("info:{}", url));
        self.infos
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(url.to_string()))
    }

    async fn download_audio(
        &self,
        url: &str,
        _format: InputFormat,
        dest: &Path,
    ) -> Result<(), PipelineError> {
        self.record(format!("download:{}", url));
        if self.failing_downloads.contains(url) {
            return Err(PipelineError::Download(format!("connection reset for {}", url)));
        }
        std::fs::write(dest, format!("audio from {}", url))?;
        Ok(())
    }
}

/// Copies input to output, or fails every call
#[derive(Default)]
pub struct FakeTranscoder {
    pub fail: bool,
    pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeTranscoder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    fn name(&self) -> &'static str {
        "fake-transcoder"
    }

    async fn transcode(
        &self,
        input: &Path,
        _input_format: InputFormat,
        output: &Path,
        _output_format: OutputFormat,
    ) -> Result<(), PipelineError> {
        self.calls
            .lock()
            .unwrap()
            .push((input.to_path_buf(), output.to_path_buf()));
        if self.fail {
            return Err(PipelineError::Transcode("exit status: 1".to_string()));
        }
        std::fs::copy(input, output)?;
        Ok(())
    }
}

/// Answers prompts from pre-recorded queues; an empty queue declines / aborts
#[derive(Default)]
pub struct ScriptedChooser {
    pub picks: Mutex<VecDeque<Option<usize>>>,
    pub overwrites: Mutex<VecDeque<OverwriteDecision>>,
    pub prompts: AtomicUsize,
}

impl ScriptedChooser {
    pub fn picks(picks: impl IntoIterator<Item = Option<usize>>) -> Self {
        Self {
            picks: Mutex::new(picks.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn overwrites(answers: impl IntoIterator<Item = OverwriteDecision>) -> Self {
        Self {
            overwrites: Mutex::new(answers.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl Chooser for ScriptedChooser {
    fn choose(&self, _prompt: &str, options: &[String]) -> Option<usize> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.picks
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .filter(|i| *i < options.len())
    }

    fn confirm_overwrite(&self, _path: &Path) -> OverwriteDecision {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.overwrites
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OverwriteDecision::Abort)
    }
}
