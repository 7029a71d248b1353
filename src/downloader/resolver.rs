// Metadata resolution: turns a classified reference into a SongRecord

use std::sync::Arc;

use tracing::{debug, info};

use super::backends::spotify::extract_id;
use super::errors::PipelineError;
use super::models::{Choice, RawReference, ReferenceKind, Resolution, SongRecord};
use super::traits::{Chooser, MetadataProvider, VideoPlatform};
use super::utils::videotime_from_seconds;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

pub struct MetadataResolver {
    provider: Arc<dyn MetadataProvider>,
    platform: Arc<dyn VideoPlatform>,
    chooser: Arc<dyn Chooser>,
    manual: bool,
}

impl MetadataResolver {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        platform: Arc<dyn VideoPlatform>,
        chooser: Arc<dyn Chooser>,
    ) -> Self {
        Self {
            provider,
            platform,
            chooser,
            manual: false,
        }
    }

    /// Let the user pick among free-text search results
    pub fn with_manual(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    /// Resolve `raw` along the path chosen by the classifier.
    /// `position` is the 1-based index inside a list, when there is one.
    pub async fn resolve(
        &self,
        raw: &RawReference,
        kind: ReferenceKind,
        position: Option<usize>,
    ) -> Result<Resolution, PipelineError> {
        let resolution = match kind {
            ReferenceKind::MetadataLink => self.resolve_link(raw).await?,
            ReferenceKind::FreeText => self.resolve_text(raw).await?,
            ReferenceKind::VideoLink => self.resolve_video(raw).await?,
        };

        Ok(match resolution {
            Choice::Picked(mut song) => {
                song.position = song.position.or(position);
                info!("[Resolver] Resolved '{}' to {}", raw, song.display_name());
                Choice::Picked(song)
            }
            Choice::Declined => Choice::Declined,
        })
    }

    async fn resolve_link(&self, raw: &RawReference) -> Result<Resolution, PipelineError> {
        let id = extract_id(raw.as_str(), "track").ok_or_else(|| {
            PipelineError::InvalidInput(format!("not a track link: {}", raw))
        })?;
        debug!("[Resolver] Fetching track {} from {}", id, self.provider.name());
        let song = self.provider.track(&id).await?;
        Ok(Choice::Picked(song))
    }

    async fn resolve_text(&self, raw: &RawReference) -> Result<Resolution, PipelineError> {
        debug!("[Resolver] Searching {} for '{}'", self.provider.name(), raw);
        let mut results = self.provider.search(raw.as_str(), DEFAULT_SEARCH_LIMIT).await?;
        if results.is_empty() {
            return Err(PipelineError::NotFound(raw.to_string()));
        }

        if self.manual && results.len() > 1 {
            let options: Vec<String> = results.iter().map(describe_song).collect();
            let prompt = format!("Results for '{}':", raw);
            return Ok(match self.chooser.choose(&prompt, &options) {
                Some(i) if i < results.len() => Choice::Picked(results.swap_remove(i)),
                _ => Choice::Declined,
            });
        }

        // "artist - title" lines (written for unlinked collection entries) prefer an exact match
        if let Some(wanted) = requested_song(raw.as_str()) {
            match results.iter().position(|s| s.same_song(&wanted)) {
                Some(i) => {
                    if i > 0 {
                        debug!("[Resolver] Preferring exact match at result {}", i + 1);
                    }
                    return Ok(Choice::Picked(results.swap_remove(i)));
                }
                None => debug!(
                    "[Resolver] No exact match for '{}', taking {}",
                    raw,
                    results[0].display_name()
                ),
            }
        }

        Ok(Choice::Picked(results.swap_remove(0)))
    }

    async fn resolve_video(&self, raw: &RawReference) -> Result<Resolution, PipelineError> {
        let url = video_url(raw.as_str());
        let info = self.platform.video_info(&url).await?;

        Ok(Choice::Picked(SongRecord {
            title: info.title,
            artist: None,
            duration_secs: info.duration_secs,
            video_url: Some(url),
            ..Default::default()
        }))
    }
}

/// Canonical watch URL for a bare id or any (possibly scheme-less) watch link
fn video_url(raw: &str) -> String {
    if !raw.contains("watch?v=") {
        return format!("{}{}", WATCH_URL, raw);
    }

    let absolute = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let id = url::Url::parse(&absolute).ok().and_then(|u| {
        u.query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    });
    match id {
        Some(id) => format!("{}{}", WATCH_URL, id),
        None => absolute,
    }
}

fn requested_song(raw: &str) -> Option<SongRecord> {
    let (artist, title) = raw.split_once(" - ")?;
    let (artist, title) = (artist.trim(), title.trim());
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some(SongRecord {
        title: title.to_string(),
        artist: Some(artist.to_string()),
        ..Default::default()
    })
}

fn describe_song(song: &SongRecord) -> String {
    let mut line = song.display_name();
    if let Some(album) = &song.album {
        line.push_str(&format!(" ({})", album));
    }
    line.push_str(&format!(" [{}]", videotime_from_seconds(song.duration_secs)));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::testing::{candidate, song, FakePlatform, FakeProvider, ScriptedChooser};

    fn resolver(
        provider: FakeProvider,
        platform: FakePlatform,
        chooser: ScriptedChooser,
    ) -> MetadataResolver {
        MetadataResolver::new(Arc::new(provider), Arc::new(platform), Arc::new(chooser))
    }

    fn picked(resolution: Resolution) -> SongRecord {
        match resolution {
            Choice::Picked(song) => song,
            Choice::Declined => panic!("expected a song"),
        }
    }

    #[tokio::test]
    async fn metadata_link_fetches_track_by_id() {
        let provider = FakeProvider::default()
            .with_track("0BCPKOYdS2jbQ8iyB56Zns", song("Clocks", Some("Coldplay"), 307));
        let r = resolver(provider, FakePlatform::default(), ScriptedChooser::default());

        let raw = RawReference::new("https://open.spotify.com/track/0BCPKOYdS2jbQ8iyB56Zns?si=x");
        let song = picked(r.resolve(&raw, ReferenceKind::MetadataLink, Some(3)).await.unwrap());
        assert_eq!(song.title, "Clocks");
        assert_eq!(song.position, Some(3));
    }

    #[tokio::test]
    async fn unknown_track_is_not_found() {
        let r = resolver(
            FakeProvider::default(),
            FakePlatform::default(),
            ScriptedChooser::default(),
        );
        let raw = RawReference::new("spotify:track:0000000000000000000000");
        let err = r.resolve(&raw, ReferenceKind::MetadataLink, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn free_text_takes_top_result() {
        let provider = FakeProvider::default().with_search(
            "clocks coldplay",
            vec![song("Clocks", Some("Coldplay"), 307), song("Clocks - Live", Some("Coldplay"), 330)],
        );
        let r = resolver(provider, FakePlatform::default(), ScriptedChooser::default());
        let raw = RawReference::new("clocks coldplay");
        let song = picked(r.resolve(&raw, ReferenceKind::FreeText, None).await.unwrap());
        assert_eq!(song.title, "Clocks");
    }

    #[tokio::test]
    async fn free_text_without_results_is_not_found() {
        let r = resolver(
            FakeProvider::default(),
            FakePlatform::default(),
            ScriptedChooser::default(),
        );
        let err = r
            .resolve(&RawReference::new("zzzz"), ReferenceKind::FreeText, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn manual_mode_uses_chooser() {
        let results = vec![song("A", Some("X"), 100), song("B", Some("Y"), 200)];
        let provider = FakeProvider::default().with_search("q", results.clone());
        let r = resolver(provider, FakePlatform::default(), ScriptedChooser::picks([Some(1)]))
            .with_manual(true);
        let song = picked(r.resolve(&RawReference::new("q"), ReferenceKind::FreeText, None).await.unwrap());
        assert_eq!(song.title, "B");

        let provider = FakeProvider::default().with_search("q", results);
        let r = resolver(provider, FakePlatform::default(), ScriptedChooser::picks([None]))
            .with_manual(true);
        let declined = r.resolve(&RawReference::new("q"), ReferenceKind::FreeText, None).await.unwrap();
        assert!(matches!(declined, Choice::Declined));
    }

    #[tokio::test]
    async fn artist_dash_title_prefers_exact_match() {
        let provider = FakeProvider::default().with_search(
            "Coldplay - Clocks",
            vec![
                song("Clocks (Piano Cover)", Some("Somebody"), 300),
                song("Clocks", Some("Coldplay"), 307),
            ],
        );
        let r = resolver(provider, FakePlatform::default(), ScriptedChooser::default());
        let raw = RawReference::new("Coldplay - Clocks");
        let song = picked(r.resolve(&raw, ReferenceKind::FreeText, None).await.unwrap());
        assert_eq!(song.artist.as_deref(), Some("Coldplay"));
        assert_eq!(song.title, "Clocks");
    }

    #[test]
    fn watch_links_are_canonicalized() {
        let canonical = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(video_url("dQw4w9WgXcQ"), canonical);
        assert_eq!(video_url("www.youtube.com/watch?v=dQw4w9WgXcQ"), canonical);
        assert_eq!(video_url("youtube.com/watch?v=dQw4w9WgXcQ&t=42"), canonical);
        assert_eq!(video_url("http://m.youtube.com/watch?v=dQw4w9WgXcQ"), canonical);
    }

    #[tokio::test]
    async fn scheme_less_watch_link_resolves() {
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        let platform = Arc::new(
            FakePlatform::default().with_info(url, candidate("Never Gonna Give You Up", 213, 0)),
        );
        let r = MetadataResolver::new(
            Arc::new(FakeProvider::default()),
            platform.clone(),
            Arc::new(ScriptedChooser::default()),
        );

        let raw = RawReference::new("www.youtube.com/watch?v=dQw4w9WgXcQ");
        let song = picked(r.resolve(&raw, ReferenceKind::VideoLink, None).await.unwrap());
        assert_eq!(song.video_url.as_deref(), Some(url));
        assert_eq!(platform.calls(), vec![format!("info:{}", url)]);
    }

    #[tokio::test]
    async fn video_link_skips_provider() {
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        let platform = FakePlatform::default()
            .with_info(url, candidate("Never Gonna Give You Up (Official Video)", 213, 0));
        let provider = Arc::new(FakeProvider::default());
        let r = MetadataResolver::new(
            provider.clone(),
            Arc::new(platform),
            Arc::new(ScriptedChooser::default()),
        );

        let song = picked(
            r.resolve(&RawReference::new("dQw4w9WgXcQ"), ReferenceKind::VideoLink, None)
                .await
                .unwrap(),
        );
        assert_eq!(song.title, "Never Gonna Give You Up (Official Video)");
        assert_eq!(song.artist, None);
        assert_eq!(song.duration_secs, 213);
        assert_eq!(song.video_url.as_deref(), Some(url));
        assert_eq!(provider.call_count(), 0);
    }
}
