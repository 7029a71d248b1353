// Acquisition: download, transcode, tag and place one song in the output folder

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::errors::PipelineError;
use super::models::{
    AcquisitionResult, Candidate, InputFormat, OutputFormat, OverwriteDecision, OverwritePolicy,
    SkipReason, SongRecord,
};
use super::tagger::Tagger;
use super::traits::{Chooser, Transcoder, VideoPlatform};
use super::utils::{sanitize_title, sweep_temp_files, TEMP_SUFFIX};

#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionConfig {
    pub folder: PathBuf,
    pub overwrite: OverwritePolicy,
    pub input: InputFormat,
    pub output: OutputFormat,
    /// Embed tags and cover art
    pub want_metadata: bool,
    pub dry_run: bool,
    /// Extra attempts for download/transcode failures
    pub retries: u32,
}

impl AcquisitionConfig {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            overwrite: OverwritePolicy::default(),
            input: InputFormat::default(),
            output: OutputFormat::default(),
            want_metadata: true,
            dry_run: false,
            retries: 0,
        }
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_formats(mut self, input: InputFormat, output: OutputFormat) -> Self {
        self.input = input;
        self.output = output;
        self
    }

    pub fn with_metadata(mut self, want_metadata: bool) -> Self {
        self.want_metadata = want_metadata;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

pub struct AcquisitionEngine {
    platform: Arc<dyn VideoPlatform>,
    transcoder: Arc<dyn Transcoder>,
    chooser: Arc<dyn Chooser>,
    tagger: Tagger,
    config: AcquisitionConfig,
    prepared: AtomicBool,
}

impl AcquisitionEngine {
    pub fn new(
        platform: Arc<dyn VideoPlatform>,
        transcoder: Arc<dyn Transcoder>,
        chooser: Arc<dyn Chooser>,
        tagger: Tagger,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            platform,
            transcoder,
            chooser,
            tagger,
            config,
            prepared: AtomicBool::new(false),
        }
    }

    pub fn output_stem(song: &SongRecord) -> String {
        sanitize_title(&song.display_name())
    }

    pub fn final_path(&self, song: &SongRecord) -> PathBuf {
        self.config
            .folder
            .join(format!("{}{}", Self::output_stem(song), self.config.output.ext()))
    }

    fn download_temp(&self, stem: &str) -> PathBuf {
        self.config
            .folder
            .join(format!("{}{}{}", stem, self.config.input.ext(), TEMP_SUFFIX))
    }

    fn converted_temp(&self, stem: &str) -> PathBuf {
        self.config
            .folder
            .join(format!("{}.converted{}{}", stem, self.config.output.ext(), TEMP_SUFFIX))
    }

    /// Create the folder and clear leftover `.temp` files, once per run
    pub fn prepare_folder(&self) -> Result<(), PipelineError> {
        if self.config.dry_run || self.prepared.load(Ordering::SeqCst) {
            return Ok(());
        }
        let removed = sweep_temp_files(&self.config.folder)?;
        if removed > 0 {
            info!(
                "[Acquire] Removed {} unfinished download(s) from {}",
                removed,
                self.config.folder.display()
            );
        }
        self.prepared.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn acquire(&self, song: &SongRecord, candidate: &Candidate) -> AcquisitionResult {
        match self.try_acquire(song, candidate).await {
            Ok(result) => result,
            Err(e) => {
                if !e.is_abort() {
                    error!("[Acquire] {} failed: {}", song.display_name(), e);
                }
                AcquisitionResult::Failed(e)
            }
        }
    }

    async fn try_acquire(
        &self,
        song: &SongRecord,
        candidate: &Candidate,
    ) -> Result<AcquisitionResult, PipelineError> {
        let stem = Self::output_stem(song);
        let final_path = self.final_path(song);

        if self.config.dry_run {
            info!(
                "[Acquire] Dry run: would fetch {} -> {}",
                candidate.url,
                final_path.display()
            );
            return Ok(AcquisitionResult::Skipped(SkipReason::DryRun {
                title: song.display_name(),
                url: candidate.url.clone(),
            }));
        }

        if final_path.exists() {
            match self.config.overwrite {
                OverwritePolicy::Force => {
                    debug!("[Acquire] Overwriting {}", final_path.display());
                }
                OverwritePolicy::Skip => {
                    info!("[Acquire] Skipping existing {}", final_path.display());
                    return Ok(AcquisitionResult::Skipped(SkipReason::AlreadyExists(final_path)));
                }
                OverwritePolicy::Prompt => match self.chooser.confirm_overwrite(&final_path) {
                    OverwriteDecision::Overwrite => {}
                    OverwriteDecision::Skip => {
                        return Ok(AcquisitionResult::Skipped(SkipReason::DeclinedOverwrite(
                            final_path,
                        )))
                    }
                    OverwriteDecision::Abort => return Err(PipelineError::UserAbort),
                },
            }
        }

        self.prepare_folder()?;

        let download_temp = self.download_temp(&stem);
        let converted_temp = self.converted_temp(&stem);

        info!("[Acquire] Downloading {} ({})", song.display_name(), candidate.url);
        let platform = &self.platform;
        let url = candidate.url.as_str();
        let input = self.config.input;
        let dest = download_temp.as_path();
        retry_step("download", self.config.retries, move || {
            platform.download_audio(url, input, dest)
        })
        .await?;

        debug!(
            "[Acquire] Transcoding with {} to {}",
            self.transcoder.name(),
            converted_temp.display()
        );
        let transcoder = &self.transcoder;
        let output = self.config.output;
        let converted = converted_temp.as_path();
        retry_step("transcode", self.config.retries, move || {
            transcoder.transcode(dest, input, converted, output)
        })
        .await?;

        if self.config.want_metadata {
            if let Err(e) = self.tagger.embed(&converted_temp, song).await {
                warn!("[Acquire] Keeping untagged file: {}", e);
            }
        }

        std::fs::rename(&converted_temp, &final_path)?;
        remove_if_present(&download_temp)?;

        info!("[Acquire] ✓ Saved {}", final_path.display());
        Ok(AcquisitionResult::Downloaded(final_path))
    }
}

fn remove_if_present(path: &Path) -> Result<(), PipelineError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn retry_policy() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_secs(10),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(120)),
        ..Default::default()
    }
}

/// Run `operation`, re-attempting retryable failures up to `retries` more times
async fn retry_step<T, F, Fut>(step: &str, retries: u32, operation: F) -> Result<T, PipelineError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempts = 0;
    let mut backoff = retry_policy();

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempts <= retries => match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        "[Acquire] {} attempt {} failed ({}), retrying in {}ms",
                        step,
                        attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        }
    }
}
