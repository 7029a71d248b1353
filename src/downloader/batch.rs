// Batch mode: work through a list file, dropping each line once it is done

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::errors::PipelineError;
use super::models::{AcquisitionResult, BatchSummary, RawReference};
use super::orchestrator::Pipeline;

/// Line-oriented list of references backed by a file
#[derive(Debug)]
pub struct ListFile {
    path: PathBuf,
    entries: Vec<RawReference>,
}

impl ListFile {
    /// Load `path`; blank lines are ignored
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            PipelineError::InvalidInput(format!("cannot read list {}: {}", path.display(), e))
        })?;
        let entries = content
            .lines()
            .map(RawReference::new)
            .filter(|r| !r.is_empty())
            .collect();
        Ok(Self { path, entries })
    }

    /// New list at `path`; nothing is written until `persist`
    pub fn create(path: impl Into<PathBuf>, entries: Vec<RawReference>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RawReference> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[RawReference] {
        &self.entries
    }

    pub fn remove(&mut self, index: usize) -> Option<RawReference> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Rewrite the file through a sibling temp file and a rename
    pub fn persist(&self) -> Result<(), PipelineError> {
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        {
            let mut file = std::fs::File::create(&tmp)?;
            for entry in &self.entries {
                writeln!(file, "{}", entry)?;
            }
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        debug!("[Batch] Rewrote {} ({} left)", self.path.display(), self.entries.len());
        Ok(())
    }
}

pub struct BatchCoordinator<'a> {
    pipeline: &'a Pipeline,
    dry_run: bool,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(pipeline: &'a Pipeline, dry_run: bool) -> Self {
        Self { pipeline, dry_run }
    }

    /// Process every line of `list_path` in order, one at a time.
    /// Completed lines are removed from the file as soon as they finish;
    /// failed ones stay for the next run. A user abort stops everything.
    pub async fn run_batch(&self, list_path: &Path) -> Result<BatchSummary, PipelineError> {
        let mut list = ListFile::open(list_path)?;
        let total = list.len();
        info!("[Batch] {} entries in {}", total, list_path.display());

        let mut summary = BatchSummary::default();
        let mut index = 0;
        let mut position = 0;

        while let Some(raw) = list.get(index).cloned() {
            position += 1;
            info!("[Batch] ({}/{}) {}", position, total, raw);

            let result = self.pipeline.process(&raw, Some(position)).await;
            if matches!(result, AcquisitionResult::Failed(PipelineError::UserAbort)) {
                summary.aborted = true;
                log_summary(&summary, list.len());
                return Err(PipelineError::UserAbort);
            }
            summary.record(&result);

            if result.is_complete() && !self.dry_run {
                list.remove(index);
                list.persist()?;
            } else {
                if let AcquisitionResult::Failed(e) = &result {
                    warn!("[Batch] Keeping '{}' in the list: {}", raw, e);
                }
                index += 1;
            }
        }

        log_summary(&summary, list.len());
        Ok(summary)
    }
}

fn log_summary(summary: &BatchSummary, remaining: usize) {
    info!(
        "[Batch] Done: {} downloaded, {} skipped, {} failed, {} left in list{}",
        summary.downloaded,
        summary.skipped,
        summary.failed,
        remaining,
        if summary.aborted { " (aborted)" } else { "" }
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::downloader::acquisition::{AcquisitionConfig, AcquisitionEngine};
    use crate::downloader::locator::{LocatorConfig, SourceLocator};
    use crate::downloader::models::{OverwriteDecision, OverwritePolicy};
    use crate::downloader::resolver::MetadataResolver;
    use crate::downloader::tagger::Tagger;
    use crate::downloader::testing::{
        candidate, song, FakePlatform, FakeProvider, FakeTranscoder, ScriptedChooser,
    };

    fn provider() -> FakeProvider {
        FakeProvider::default()
            .with_search("first song", vec![song("First", Some("A"), 100)])
            .with_search("second song", vec![song("Second", Some("B"), 200)])
            .with_search("third song", vec![song("Third", Some("C"), 300)])
    }

    fn platform() -> FakePlatform {
        FakePlatform::default()
            .with_results("A First", vec![candidate("first", 100, 0)])
            .with_results("C Third", vec![candidate("third", 300, 0)])
        // "B Second" has no video, so it always fails
    }

    fn pipeline(chooser: ScriptedChooser, config: AcquisitionConfig) -> Pipeline {
        let provider = Arc::new(provider());
        let platform = Arc::new(platform());
        let chooser = Arc::new(chooser);
        Pipeline::new(
            MetadataResolver::new(provider, platform.clone(), chooser.clone()),
            SourceLocator::new(platform.clone(), chooser.clone(), LocatorConfig::default()),
            AcquisitionEngine::new(
                platform,
                Arc::new(FakeTranscoder::default()),
                chooser,
                Tagger::new(reqwest::Client::new()),
                config.with_metadata(false),
            ),
        )
    }

    fn write_list(dir: &Path, lines: &str) -> PathBuf {
        let path = dir.join("songs.txt");
        std::fs::write(&path, lines).unwrap();
        path
    }

    #[test]
    fn list_file_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_list(dir.path(), "one\n\n   \ntwo  \n");
        let list = ListFile::open(&path).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).unwrap().as_str(), "two");
    }

    #[test]
    fn persist_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_list(dir.path(), "one\ntwo\nthree\n");
        let mut list = ListFile::open(&path).unwrap();
        list.remove(1);
        list.persist().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\nthree\n");
        assert!(!dir.path().join("songs.txt.tmp").exists());
    }

    #[tokio::test]
    async fn failures_are_retained_and_rerun_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music");
        let list = write_list(dir.path(), "first song\n\nsecond song\nthird song\n");
        let p = pipeline(
            ScriptedChooser::default(),
            AcquisitionConfig::new(&music).with_overwrite(OverwritePolicy::Skip),
        );
        let batch = BatchCoordinator::new(&p, false);

        let summary = batch.run_batch(&list).await.unwrap();
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(std::fs::read_to_string(&list).unwrap(), "second song\n");
        assert!(music.join("A_-_First.mp3").exists());
        assert!(music.join("C_-_Third.mp3").exists());

        let again = batch.run_batch(&list).await.unwrap();
        assert_eq!(again.downloaded, 0);
        assert_eq!(again.failed, 1);
        assert_eq!(std::fs::read_to_string(&list).unwrap(), "second song\n");
    }

    #[tokio::test]
    async fn abort_stops_and_keeps_remaining_lines() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music");
        std::fs::create_dir_all(&music).unwrap();
        std::fs::write(music.join("A_-_First.mp3"), b"old").unwrap();
        let list = write_list(dir.path(), "first song\nthird song\n");
        let p = pipeline(
            ScriptedChooser::overwrites([OverwriteDecision::Abort]),
            AcquisitionConfig::new(&music),
        );

        let err = BatchCoordinator::new(&p, false).run_batch(&list).await.unwrap_err();
        assert!(matches!(err, PipelineError::UserAbort));
        assert_eq!(
            std::fs::read_to_string(&list).unwrap(),
            "first song\nthird song\n"
        );
        assert!(!music.join("C_-_Third.mp3").exists());
    }

    #[tokio::test]
    async fn dry_run_leaves_list_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music");
        let original = "first song\n\nthird song\n";
        let list = write_list(dir.path(), original);
        let p = pipeline(
            ScriptedChooser::default(),
            AcquisitionConfig::new(&music).with_dry_run(true),
        );

        let summary = BatchCoordinator::new(&p, true).run_batch(&list).await.unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(std::fs::read_to_string(&list).unwrap(), original);
        assert!(!music.exists());
    }

    #[tokio::test]
    async fn missing_list_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            ScriptedChooser::default(),
            AcquisitionConfig::new(dir.path()),
        );
        let err = BatchCoordinator::new(&p, false)
            .run_batch(&dir.path().join("nope.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
