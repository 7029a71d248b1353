use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::downloader::errors::PipelineError;
use crate::downloader::models::{InputFormat, OutputFormat};
use crate::downloader::tools::ToolType;
use crate::downloader::traits::Transcoder;
use crate::downloader::utils::run_output_with_timeout;

const AUDIO_BITRATE: &str = "192k";

/// ffmpeg or its libav fork avconv; both share the option set used here
pub struct FfmpegTranscoder {
    program: String,
    flavor: ToolType,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>, flavor: ToolType) -> Self {
        Self {
            program: program.into(),
            flavor,
        }
    }

    fn build_args(
        &self,
        input: &Path,
        input_format: InputFormat,
        output: &Path,
        output_format: OutputFormat,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
        if self.flavor == ToolType::Ffmpeg {
            args.extend(["-nostdin".to_string(), "-hide_banner".to_string()]);
        }
        args.extend(["-i".to_string(), input.to_string_lossy().to_string(), "-vn".to_string()]);

        match (input_format, output_format) {
            // Already AAC, only the container changes
            (InputFormat::M4a, OutputFormat::M4a) => {
                args.extend(["-acodec".to_string(), "copy".to_string()]);
            }
            (InputFormat::Webm, OutputFormat::M4a) => {
                args.extend([
                    "-acodec".to_string(),
                    "aac".to_string(),
                    "-b:a".to_string(),
                    AUDIO_BITRATE.to_string(),
                ]);
                if self.flavor == ToolType::Avconv {
                    args.extend(["-strict".to_string(), "experimental".to_string()]);
                }
            }
            (_, OutputFormat::Mp3) => {
                args.extend([
                    "-acodec".to_string(),
                    "libmp3lame".to_string(),
                    "-b:a".to_string(),
                    AUDIO_BITRATE.to_string(),
                ]);
            }
        }

        // Output path ends in .temp, so the muxer must be explicit
        args.extend([
            "-f".to_string(),
            output_format.muxer().to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        self.flavor.as_str()
    }

    async fn transcode(
        &self,
        input: &Path,
        input_format: InputFormat,
        output: &Path,
        output_format: OutputFormat,
    ) -> Result<(), PipelineError> {
        let args = self.build_args(input, input_format, output, output_format);
        info!(
            "[{}] Converting {} -> {}",
            self.name(),
            input_format.ext(),
            output_format.ext()
        );

        let output_res = run_output_with_timeout(&self.program, args, None)
            .await
            .map_err(PipelineError::Transcode)?;

        if !output_res.status.success() {
            let stderr = String::from_utf8_lossy(&output_res.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(3).collect();
            let detail = tail.into_iter().rev().collect::<Vec<_>>().join(" | ");
            debug!("[{}] stderr: {}", self.name(), stderr);
            return Err(PipelineError::Transcode(format!(
                "{} exited with {}: {}",
                self.name(),
                output_res.status,
                detail
            )));
        }

        Ok(())
    }
}
