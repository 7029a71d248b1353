// Source location: pick the video whose duration is closest to the song's

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::errors::PipelineError;
use super::models::{Candidate, Choice, SongRecord};
use super::traits::{Chooser, VideoPlatform};
use super::utils::videotime_from_seconds;

#[derive(Debug, Clone, Serialize)]
pub struct LocatorConfig {
    /// Restrict searches to the music catalogue
    pub music_only: bool,
    pub manual: bool,
    /// Reject the best candidate when it is further off than this (seconds)
    pub max_duration_delta: Option<u64>,
    pub search_limit: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            music_only: false,
            manual: false,
            max_duration_delta: None,
            search_limit: 10,
        }
    }
}

impl LocatorConfig {
    pub fn with_music_only(mut self, music_only: bool) -> Self {
        self.music_only = music_only;
        self
    }

    pub fn with_manual(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    pub fn with_max_duration_delta(mut self, delta: Option<u64>) -> Self {
        self.max_duration_delta = delta;
        self
    }
}

pub struct SourceLocator {
    platform: Arc<dyn VideoPlatform>,
    chooser: Arc<dyn Chooser>,
    config: LocatorConfig,
}

impl SourceLocator {
    pub fn new(
        platform: Arc<dyn VideoPlatform>,
        chooser: Arc<dyn Chooser>,
        config: LocatorConfig,
    ) -> Self {
        Self {
            platform,
            chooser,
            config,
        }
    }

    pub async fn locate(&self, song: &SongRecord) -> Result<Choice<Candidate>, PipelineError> {
        if let Some(url) = &song.video_url {
            debug!("[Locator] Using the given video {}", url);
            return Ok(Choice::Picked(Candidate {
                title: song.title.clone(),
                duration_secs: song.duration_secs,
                url: url.clone(),
                rank: 0,
            }));
        }

        let query = song.search_query();
        debug!("[Locator] Searching {} for '{}'", self.platform.name(), query);
        let results = self
            .platform
            .search(&query, self.config.music_only, self.config.search_limit)
            .await?;

        let ranked = rank_candidates(results, song.duration_secs);
        if ranked.is_empty() {
            return Err(PipelineError::NoMatch(query));
        }

        if self.config.manual {
            let options: Vec<String> = ranked
                .iter()
                .map(|c| format!("{} ({})", c.title, videotime_from_seconds(c.duration_secs)))
                .collect();
            let prompt = format!(
                "Videos for {} ({}):",
                song.display_name(),
                videotime_from_seconds(song.duration_secs)
            );
            return Ok(match self.chooser.choose(&prompt, &options) {
                Some(i) => ranked
                    .into_iter()
                    .nth(i)
                    .map_or(Choice::Declined, Choice::Picked),
                None => Choice::Declined,
            });
        }

        let best = ranked.into_iter().next().ok_or_else(|| PipelineError::NoMatch(query.clone()))?;
        let delta = best.duration_secs.abs_diff(song.duration_secs);
        if let Some(max) = self.config.max_duration_delta {
            if delta > max {
                return Err(PipelineError::NoMatch(format!(
                    "{}: closest video is {}s off (limit {}s)",
                    query, delta, max
                )));
            }
        }

        info!("[Locator] Picked '{}' ({}s off) {}", best.title, delta, best.url);
        Ok(Choice::Picked(best))
    }
}

/// Order candidates by closeness to `target` seconds; ties keep the platform's order.
pub fn rank_candidates(mut candidates: Vec<Candidate>, target: u64) -> Vec<Candidate> {
    candidates.sort_by_key(|c| (c.duration_secs.abs_diff(target), c.rank));
    candidates
}
