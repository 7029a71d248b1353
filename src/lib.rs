pub mod cli;
pub mod config;
pub mod downloader;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Options;
use config::{Config, Mode};
use downloader::backends::{
    ClientCredentialsToken, FfmpegTranscoder, SpotifyClient, YtDlpPlatform,
};
use downloader::tools::{ToolManager, ToolType};
use downloader::{
    classify, AcquisitionEngine, AcquisitionResult, BatchCoordinator, Chooser,
    CollectionExpander, LineChooser, MetadataProvider, MetadataResolver, Pipeline, PipelineError,
    RawReference, ReferenceKind, SourceLocator, Tagger, Transcoder, VideoPlatform,
};

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Entry point of the `trackdl` binary
pub fn run() -> Result<()> {
    let options = Options::parse();
    init_tracing(&options.log_level);

    let config = Config::from_options(options)?;
    debug!(
        "[Config] {}",
        serde_json::to_string(&config).unwrap_or_else(|e| e.to_string())
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    match runtime.block_on(execute(config)) {
        Err(e) if e.downcast_ref::<PipelineError>().map_or(false, PipelineError::is_abort) => {
            info!("Aborted by user");
            Ok(())
        }
        other => other,
    }
}

async fn execute(config: Config) -> Result<()> {
    let http = SpotifyClient::build_http(&config.network)?;
    let chooser: Arc<dyn Chooser> = Arc::new(LineChooser::stdin());

    let needs_provider = match &config.mode {
        Mode::Song(raw) => classify(raw.trim()) != ReferenceKind::VideoLink,
        Mode::List(_) | Mode::Collection { .. } => true,
    };
    if needs_provider && !config.credentials.is_complete() {
        bail!("Spotify credentials missing: set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET");
    }
    let tokens = Arc::new(ClientCredentialsToken::new(
        http.clone(),
        config.credentials.clone(),
    ));
    let provider: Arc<dyn MetadataProvider> = Arc::new(SpotifyClient::new(http.clone(), tokens));

    if let Mode::Collection { url, kind } = &config.mode {
        let expander = CollectionExpander::new(provider, chooser, &config.list_dir)
            .with_dry_run(config.dry_run);
        let path = expander.expand(url, *kind).await?;
        info!("List written to {}", path.display());
        return Ok(());
    }

    let tools = ToolManager::new();
    let ytdlp = tools.require(ToolType::YtDlp)?;
    let transcoder_bin = if config.dry_run {
        config.transcoder.as_str().to_string()
    } else {
        tools.require(config.transcoder)?
    };

    let platform: Arc<dyn VideoPlatform> =
        Arc::new(YtDlpPlatform::new(ytdlp, config.network.clone()));
    let transcoder: Arc<dyn Transcoder> =
        Arc::new(FfmpegTranscoder::new(transcoder_bin, config.transcoder));

    let pipeline = Pipeline::new(
        MetadataResolver::new(provider, platform.clone(), chooser.clone())
            .with_manual(config.manual),
        SourceLocator::new(platform.clone(), chooser.clone(), config.locator()),
        AcquisitionEngine::new(
            platform,
            transcoder,
            chooser,
            Tagger::new(http),
            config.acquisition(),
        ),
    );

    match &config.mode {
        Mode::Song(raw) => match pipeline.process(&RawReference::new(raw.as_str()), None).await {
            AcquisitionResult::Downloaded(path) => {
                info!("Saved {}", path.display());
                Ok(())
            }
            AcquisitionResult::Skipped(reason) => {
                info!("Nothing downloaded: {}", reason);
                Ok(())
            }
            AcquisitionResult::Failed(e) => Err(e.into()),
        },
        Mode::List(path) => {
            let summary = BatchCoordinator::new(&pipeline, config.dry_run)
                .run_batch(path)
                .await?;
            if summary.failed > 0 {
                info!("{} entries failed and remain in {}", summary.failed, path.display());
            }
            Ok(())
        }
        Mode::Collection { .. } => Ok(()),
    }
}
