// Helper functions shared by the pipeline and backend implementations

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};
use tracing::debug;

use crate::downloader::models::NetworkConfig;

/// Suffix of partially written files
pub const TEMP_SUFFIX: &str = ".temp";

// Characters kept verbatim besides letters and digits
const SLUG_OK: &str = "-_()[]{}";

/// Longest stem in bytes; leaves room for suffixes such as `.converted.m4a.temp`
/// under the common 255-byte file name limit.
pub const MAX_STEM_BYTES: usize = 255 - 24;

/// Run command and collect its output. `timeout_secs: None` waits as long as the tool runs.
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: Option<u64>,
) -> Result<std::process::Output, String> {
    debug!("[Process] {} {}", program, args.join(" "));

    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| format!("Failed to capture stdout from {}", program))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| format!("Failed to capture stderr from {}", program))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    let status = match timeout_secs {
        Some(secs) => match timeout(TokioDuration::from_secs(secs), child.wait()).await {
            Ok(status_res) => status_res,
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(format!("{} timed out after {}s", program, secs));
            }
        },
        None => child.wait().await,
    }
    .map_err(|e| format!("Failed to wait for {}: {}", program, e))?;

    let stdout = stdout_task
        .await
        .map_err(|e| format!("stdout task failed: {}", e))??;
    let stderr = stderr_task
        .await
        .map_err(|e| format!("stderr task failed: {}", e))??;
    Ok(std::process::Output { status, stdout, stderr })
}

/// Build proxy arguments for yt-dlp
pub fn get_proxy_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(proxy) = &config.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

/// Build timeout arguments for yt-dlp
pub fn get_timeout_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(timeout) = config.timeout {
        args.push("--socket-timeout".to_string());
        args.push(timeout.to_string());
    }

    args
}

/// Create `folder` if needed and delete every stale `.temp` file in it.
/// Returns how many files were removed.
pub fn sweep_temp_files(folder: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(folder)?;

    let mut removed = 0;
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        let is_temp = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.ends_with(TEMP_SUFFIX));
        if is_temp && path.is_file() {
            debug!("[Sweep] Removing stale {}", path.display());
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }

    Ok(removed)
}

/// Filesystem-safe file stem: separators and whitespace become a single `_`,
/// letters, digits and `-_()[]{}` are kept (case preserved), everything else is dropped.
pub fn sanitize_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());

    for c in title.chars() {
        if c.is_whitespace() || c == '/' || c == '\\' || c == '_' {
            if !slug.ends_with('_') {
                slug.push('_');
            }
        } else if c.is_alphanumeric() || SLUG_OK.contains(c) {
            slug.push(c);
        }
    }

    let slug = slug.trim_matches('_');
    let slug = sanitize_filename::sanitize_with_options(
        slug,
        sanitize_filename::Options {
            windows: true,
            truncate: true,
            replacement: "_",
        },
    );

    let slug = truncate_on_char_boundary(&slug, MAX_STEM_BYTES).trim_end_matches('_');

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

fn truncate_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Render seconds as `s`, `m:ss` or `h:mm:ss`
pub fn videotime_from_seconds(secs: u64) -> String {
    if secs < 60 {
        secs.to_string()
    } else if secs < 3600 {
        format!("{}:{:02}", secs / 60, secs % 60)
    } else {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
