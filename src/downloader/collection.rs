// Collection expansion: turn a playlist, album or user library into a list file

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::backends::spotify::extract_id;
use super::batch::ListFile;
use super::errors::PipelineError;
use super::models::{CollectionEntry, CollectionKind, PlaylistSummary};
use super::traits::{Chooser, MetadataProvider};
use super::utils::sanitize_title;

pub struct CollectionExpander {
    provider: Arc<dyn MetadataProvider>,
    chooser: Arc<dyn Chooser>,
    list_dir: PathBuf,
    dry_run: bool,
}

impl CollectionExpander {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        chooser: Arc<dyn Chooser>,
        list_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            chooser,
            list_dir: list_dir.into(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Write every track of the collection at `url` into
    /// `<list_dir>/<collection name>.txt` and return that path.
    pub async fn expand(&self, url: &str, kind: CollectionKind) -> Result<PathBuf, PipelineError> {
        let (kind, id) = match kind {
            CollectionKind::User => {
                let user = extract_id(url, "user").ok_or_else(|| {
                    PipelineError::InvalidInput(format!("not a user link: {}", url))
                })?;
                let playlist = self.choose_playlist(&user).await?;
                (CollectionKind::Playlist, playlist.id)
            }
            kind => {
                let segment = kind.to_string();
                let id = extract_id(url, &segment).ok_or_else(|| {
                    PipelineError::InvalidInput(format!("not a {} link: {}", segment, url))
                })?;
                (kind, id)
            }
        };

        let (name, entries) = self.fetch_all(kind, &id).await?;
        let path = self
            .list_dir
            .join(format!("{}.txt", sanitize_title(&name)));
        info!("[Collection] {} '{}': {} tracks", kind, name, entries.len());

        let lines = entries.iter().map(CollectionEntry::as_reference).collect();
        let list = ListFile::create(&path, lines);

        if self.dry_run {
            for entry in list.entries() {
                info!("[Collection] Dry run: {}", entry);
            }
            return Ok(path);
        }

        std::fs::create_dir_all(&self.list_dir)?;
        list.persist()?;
        info!("[Collection] Wrote {}", path.display());
        Ok(path)
    }

    /// Follow `next` cursors until the listing is exhausted
    async fn fetch_all(
        &self,
        kind: CollectionKind,
        id: &str,
    ) -> Result<(String, Vec<CollectionEntry>), PipelineError> {
        let mut name = None;
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();

        loop {
            let page = self
                .provider
                .collection_page(kind, id, cursor.as_deref())
                .await?;
            debug!("[Collection] Page with {} tracks", page.entries.len());
            if name.is_none() {
                name = page.name;
            }
            entries.extend(page.entries);

            match page.next {
                Some(next) if seen.insert(next.clone()) => cursor = Some(next),
                _ => break,
            }
        }

        Ok((name.unwrap_or_else(|| id.to_string()), entries))
    }

    async fn choose_playlist(&self, user: &str) -> Result<PlaylistSummary, PipelineError> {
        let mut playlists = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();

        loop {
            let page = self
                .provider
                .user_playlists_page(user, cursor.as_deref())
                .await?;
            playlists.extend(page.playlists);
            match page.next {
                Some(next) if seen.insert(next.clone()) => cursor = Some(next),
                _ => break,
            }
        }

        if playlists.is_empty() {
            return Err(PipelineError::NotFound(format!("no public playlists for {}", user)));
        }

        let options: Vec<String> = playlists
            .iter()
            .map(|p| format!("{} ({} tracks)", p.name, p.total_tracks))
            .collect();
        let prompt = format!("Playlists of {}:", user);
        match self.chooser.choose(&prompt, &options) {
            Some(i) if i < playlists.len() => Ok(playlists.swap_remove(i)),
            _ => Err(PipelineError::UserAbort),
        }
    }
}
