use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::downloader::errors::PipelineError;
use crate::downloader::models::{Candidate, DownloadProgress, InputFormat, NetworkConfig};
use crate::downloader::traits::VideoPlatform;
use crate::downloader::utils::{get_proxy_args, get_timeout_args, run_output_with_timeout};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const MUSIC_SEARCH_URL: &str = "https://music.youtube.com/search";

/// YouTube through the yt-dlp binary
pub struct YtDlpPlatform {
    ytdlp_bin: String,
    network: NetworkConfig,
}

impl YtDlpPlatform {
    pub fn new(ytdlp_bin: impl Into<String>, network: NetworkConfig) -> Self {
        Self {
            ytdlp_bin: ytdlp_bin.into(),
            network,
        }
    }

    fn network_args(&self) -> Vec<String> {
        let mut args = get_proxy_args(&self.network);
        args.extend(get_timeout_args(&self.network));
        args
    }

    /// Search target understood by yt-dlp
    fn search_target(query: &str, music_only: bool, limit: usize) -> String {
        if music_only {
            match url::Url::parse_with_params(MUSIC_SEARCH_URL, &[("q", query)]) {
                Ok(mut url) => {
                    url.set_fragment(Some("songs"));
                    return url.to_string();
                }
                Err(e) => debug!("[yt-dlp] Could not build music search URL: {}", e),
            }
        }
        format!("ytsearch{}:{}", limit, query)
    }

    async fn run_json(&self, args: Vec<String>) -> Result<Vec<u8>, PipelineError> {
        // No timeout of our own; yt-dlp's --socket-timeout bounds each request
        let output = run_output_with_timeout(&self.ytdlp_bin, args, None)
            .await
            .map_err(PipelineError::from)?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(error.to_string().into());
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl VideoPlatform for YtDlpPlatform {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn search(
        &self,
        query: &str,
        music_only: bool,
        limit: usize,
    ) -> Result<Vec<Candidate>, PipelineError> {
        let target = Self::search_target(query, music_only, limit);
        let mut args = vec![
            "--dump-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--playlist-end".to_string(),
            limit.to_string(),
        ];
        args.extend(self.network_args());
        args.push(target);

        info!("[yt-dlp] Searching: {}", query);
        let stdout = self.run_json(args).await?;
        let candidates = parse_search_results(&stdout);
        debug!("[yt-dlp] {} usable results", candidates.len());
        Ok(candidates)
    }

    async fn video_info(&self, url: &str) -> Result<Candidate, PipelineError> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(self.network_args());
        args.push(url.to_string());

        let stdout = self.run_json(args).await?;
        parse_video_info(&stdout)
    }

    async fn download_audio(
        &self,
        url: &str,
        format: InputFormat,
        dest: &Path,
    ) -> Result<(), PipelineError> {
        // -o is an output template; literal percent signs must be doubled
        let template = dest.to_string_lossy().replace('%', "%%");
        let mut args = vec![
            "-f".to_string(),
            format.format_spec().to_string(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--no-part".to_string(),
            "--force-overwrites".to_string(),
            "--no-warnings".to_string(),
            "-o".to_string(),
            template,
        ];
        args.extend(self.network_args());
        args.push(url.to_string());

        debug!("[yt-dlp] {} {}", self.ytdlp_bin, args.join(" "));

        let mut child = Command::new(&self.ytdlp_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::ToolNotFound(format!("yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Download("Failed to capture stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipelineError::Download("Failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(progress) = parse_ytdlp_progress(&line) {
                debug!("[yt-dlp] {:.1}% {}", progress.percent, progress.status);
            }
        }

        let status = child.wait().await?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(stderr_output.into());
        }
        if !dest.exists() {
            return Err(PipelineError::Download(format!(
                "yt-dlp exited cleanly but {} was not written",
                dest.display()
            )));
        }

        Ok(())
    }
}

/// One JSON object per line, in platform rank order
fn parse_search_results(stdout: &[u8]) -> Vec<Candidate> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .filter_map(|(rank, line)| {
            let json: serde_json::Value = match serde_json::from_str(line) {
                Ok(json) => json,
                Err(e) => {
                    debug!("[yt-dlp] Skipping unparsable result {}: {}", rank, e);
                    return None;
                }
            };
            candidate_from_json(&json, rank)
        })
        .collect()
}

fn parse_video_info(stdout: &[u8]) -> Result<Candidate, PipelineError> {
    let json_str = String::from_utf8_lossy(stdout);
    let json: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| PipelineError::NotFound(format!("JSON parse error: {}", e)))?;

    candidate_from_json(&json, 0)
        .ok_or_else(|| PipelineError::NotFound("video has no title or duration".to_string()))
}

// Live streams and channels carry no duration and are never candidates
fn candidate_from_json(json: &serde_json::Value, rank: usize) -> Option<Candidate> {
    let duration = json["duration"].as_f64()?;
    let title = json["title"].as_str()?.to_string();

    let url = json["webpage_url"]
        .as_str()
        .filter(|u| u.starts_with("http"))
        .or_else(|| json["url"].as_str().filter(|u| u.starts_with("http")))
        .map(str::to_string)
        .or_else(|| json["id"].as_str().map(|id| format!("{}{}", WATCH_URL, id)))?;

    Some(Candidate {
        title,
        duration_secs: duration.round() as u64,
        url,
        rank,
    })
}

/// Parse yt-dlp progress line like:
/// [download]   6.2% of ~ 3.72MiB at  420.30KiB/s ETA 00:32
fn parse_ytdlp_progress(line: &str) -> Option<DownloadProgress> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)(?:\s+at\s+(\S+\s*\w*/s))?(?:\s+ETA\s+(\S+))?"
        ).unwrap();
        static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
        static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
    }

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let size = caps.get(2).map(|m| m.as_str()).unwrap_or("?");
        let speed = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("?");
        let status = match caps.get(4) {
            Some(eta) => format!("of {} @ {} ETA {}", size, speed, eta.as_str()),
            None => format!("of {} @ {}", size, speed),
        };
        return Some(DownloadProgress { percent, status });
    }

    if let Some(caps) = DEST_RE.captures(line) {
        let filename = caps.get(1).map(|m| m.as_str()).unwrap_or("file");
        return Some(DownloadProgress {
            percent: 0.0,
            status: format!("starting {}", filename),
        });
    }

    if ALREADY_RE.is_match(line) {
        return Some(DownloadProgress {
            percent: 100.0,
            status: "already downloaded".to_string(),
        });
    }

    None
}
