// Downloader module - song resolution and acquisition pipeline

pub mod acquisition;
pub mod backends;
pub mod batch;
pub mod chooser;
pub mod classifier;
pub mod collection;
pub mod errors;
pub mod locator;
pub mod models;
pub mod orchestrator;
pub mod resolver;
pub mod tagger;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub mod testing;

pub use acquisition::{AcquisitionConfig, AcquisitionEngine};
pub use batch::{BatchCoordinator, ListFile};
pub use chooser::LineChooser;
pub use classifier::classify;
pub use collection::CollectionExpander;
pub use errors::PipelineError;
pub use locator::{LocatorConfig, SourceLocator};
pub use models::{
    AcquisitionResult, BatchSummary, Candidate, Choice, CollectionKind, InputFormat,
    NetworkConfig, OutputFormat, OverwritePolicy, RawReference, ReferenceKind, SongRecord,
};
pub use orchestrator::Pipeline;
pub use resolver::MetadataResolver;
pub use tagger::Tagger;
pub use traits::{Chooser, MetadataProvider, Transcoder, VideoPlatform};
