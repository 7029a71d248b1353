// Tag embedding (ID3v2 for mp3, ilst for m4a) through lofty

use std::path::{Path, PathBuf};

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use tracing::{debug, warn};

use super::errors::PipelineError;
use super::models::SongRecord;

pub struct Tagger {
    http: reqwest::Client,
}

impl Tagger {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Write the song's metadata and cover art into `path`.
    /// The file type is sniffed from content, so temp names are fine.
    pub async fn embed(&self, path: &Path, song: &SongRecord) -> Result<(), PipelineError> {
        let cover = match &song.cover_url {
            Some(url) => self.fetch_cover(url).await,
            None => None,
        };

        let path: PathBuf = path.to_path_buf();
        let song = song.clone();
        tokio::task::spawn_blocking(move || write_tags(&path, &song, cover))
            .await
            .map_err(|e| PipelineError::Tag(format!("tag task failed: {}", e)))?
    }

    async fn fetch_cover(&self, url: &str) -> Option<Vec<u8>> {
        debug!("[Tagger] Fetching cover {}", url);
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("[Tagger] Cover download failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("[Tagger] Cover download failed: HTTP {}", response.status());
            return None;
        }
        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!("[Tagger] Cover download failed: {}", e);
                None
            }
        }
    }
}

fn write_tags(path: &Path, song: &SongRecord, cover: Option<Vec<u8>>) -> Result<(), PipelineError> {
    let mut tagged_file = Probe::open(path)
        .map_err(|e| tag_error(path, e))?
        .guess_file_type()
        .map_err(|e| tag_error(path, e))?
        .read()
        .map_err(|e| tag_error(path, e))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| PipelineError::Tag(format!("no writable tag for {:?}", tag_type)))?;

    apply_song(tag, song);

    if let Some(data) = cover {
        match Picture::from_reader(&mut &data[..]) {
            Ok(mut picture) => {
                picture.set_pic_type(PictureType::CoverFront);
                tag.push_picture(picture);
            }
            Err(e) => warn!("[Tagger] Ignoring unreadable cover: {}", e),
        }
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|e| tag_error(path, e))?;
    debug!("[Tagger] Tagged {}", path.display());
    Ok(())
}

fn tag_error(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Tag(format!("{}: {}", path.display(), e))
}

fn apply_song(tag: &mut Tag, song: &SongRecord) {
    tag.set_title(song.title.clone());
    if let Some(artist) = &song.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &song.album {
        tag.set_album(album.clone());
    }
    if let Some(album_artist) = &song.album_artist {
        tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
    }
    if let Some(n) = song.track_number {
        tag.set_track(n);
    }
    if let Some(total) = song.total_tracks {
        tag.set_track_total(total);
    }
    if let Some(disc) = song.disc_number {
        tag.set_disk(disc);
    }
    if let Some(year) = song.year {
        tag.insert_text(ItemKey::Year, year.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::TagType;

    fn full_song() -> SongRecord {
        SongRecord {
            title: "Clocks".into(),
            artist: Some("Coldplay".into()),
            album: Some("A Rush of Blood to the Head".into()),
            album_artist: Some("Coldplay".into()),
            duration_secs: 307,
            track_number: Some(5),
            total_tracks: Some(11),
            disc_number: Some(1),
            year: Some(2002),
            ..Default::default()
        }
    }

    #[test]
    fn applies_every_known_field() {
        let mut tag = Tag::new(TagType::Id3v2);
        apply_song(&mut tag, &full_song());

        assert_eq!(tag.title().as_deref(), Some("Clocks"));
        assert_eq!(tag.artist().as_deref(), Some("Coldplay"));
        assert_eq!(tag.album().as_deref(), Some("A Rush of Blood to the Head"));
        assert_eq!(tag.get_string(ItemKey::AlbumArtist), Some("Coldplay"));
        assert_eq!(tag.track(), Some(5));
        assert_eq!(tag.track_total(), Some(11));
        assert_eq!(tag.disk(), Some(1));
    }

    #[test]
    fn unknown_artist_is_left_unset() {
        let mut tag = Tag::new(TagType::Id3v2);
        let song = SongRecord {
            title: "Some Upload".into(),
            ..Default::default()
        };
        apply_song(&mut tag, &song);
        assert_eq!(tag.title().as_deref(), Some("Some Upload"));
        assert!(tag.artist().is_none());
    }

    #[tokio::test]
    async fn non_audio_file_is_a_tag_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.converted.mp3.temp");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let tagger = Tagger::new(reqwest::Client::new());
        let err = tagger.embed(&path, &full_song()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Tag(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"definitely not audio");
    }
}
