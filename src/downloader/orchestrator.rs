// Per-song pipeline: classify, resolve, locate, acquire

use tracing::{error, info, warn};

use super::acquisition::AcquisitionEngine;
use super::classifier::classify;
use super::errors::PipelineError;
use super::locator::SourceLocator;
use super::models::{AcquisitionResult, Choice, RawReference, SkipReason};
use super::resolver::MetadataResolver;

pub struct Pipeline {
    resolver: MetadataResolver,
    locator: SourceLocator,
    engine: AcquisitionEngine,
}

impl Pipeline {
    pub fn new(resolver: MetadataResolver, locator: SourceLocator, engine: AcquisitionEngine) -> Self {
        Self {
            resolver,
            locator,
            engine,
        }
    }

    /// Run one reference through every stage. Never panics on bad input;
    /// every failure ends up in `AcquisitionResult::Failed`.
    pub async fn process(&self, raw: &RawReference, position: Option<usize>) -> AcquisitionResult {
        if raw.is_empty() {
            return AcquisitionResult::Failed(PipelineError::InvalidInput(
                "empty reference".to_string(),
            ));
        }

        let kind = classify(raw.as_str());
        info!("[Pipeline] Processing '{}' as {:?}", raw, kind);

        let song = match self.resolver.resolve(raw, kind, position).await {
            Ok(Choice::Picked(song)) => song,
            Ok(Choice::Declined) => {
                info!("[Pipeline] No song chosen for '{}'", raw);
                return AcquisitionResult::Skipped(SkipReason::NoChoice);
            }
            Err(e) => return failed(raw, e),
        };

        let candidate = match self.locator.locate(&song).await {
            Ok(Choice::Picked(candidate)) => candidate,
            Ok(Choice::Declined) => {
                info!("[Pipeline] No video chosen for {}", song.display_name());
                return AcquisitionResult::Skipped(SkipReason::NoChoice);
            }
            Err(e) => return failed(raw, e),
        };

        let result = self.engine.acquire(&song, &candidate).await;
        if let AcquisitionResult::Skipped(reason) = &result {
            info!("[Pipeline] Skipped {}: {}", song.display_name(), reason);
        }
        result
    }
}

fn failed(raw: &RawReference, e: PipelineError) -> AcquisitionResult {
    match &e {
        PipelineError::UserAbort => warn!("[Pipeline] Aborted by user"),
        _ => error!("[Pipeline] ✗ '{}' failed: {}", raw, e),
    }
    AcquisitionResult::Failed(e)
}
