use serde::{Deserialize, Serialize};
use std::process::Command;
use tracing::{debug, info};

use super::errors::PipelineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
    Avconv,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::Avconv => "avconv",
        }
    }

    /// Environment variable that overrides binary discovery
    fn env_override(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "TRACKDL_YTDLP",
            ToolType::Ffmpeg => "TRACKDL_FFMPEG",
            ToolType::Avconv => "TRACKDL_AVCONV",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            // libav tools use single-dash long options
            ToolType::Ffmpeg | ToolType::Avconv => "-version",
        }
    }

    fn install_hint(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "install yt-dlp: pip3 install -U yt-dlp",
            ToolType::Ffmpeg => "install ffmpeg from your package manager",
            ToolType::Avconv => "install libav-tools, or drop --avconv to use ffmpeg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Default)]
pub struct ToolManager;

impl ToolManager {
    pub fn new() -> Self {
        Self
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let name = tool_type.as_str().to_string();
        let (path, version) = self.detect_tool(&tool_type);

        ToolInfo {
            name,
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    /// Resolve a tool or fail with an install hint
    pub fn require(&self, tool_type: ToolType) -> Result<String, PipelineError> {
        let info = self.get_tool_info(tool_type);
        match info.path {
            Some(path) => {
                info!(
                    "[Tools] {} {} at {}",
                    info.name,
                    info.version.as_deref().unwrap_or("(unknown version)"),
                    path
                );
                Ok(path)
            }
            None => Err(PipelineError::ToolNotFound(format!(
                "{} ({})",
                info.name,
                tool_type.install_hint()
            ))),
        }
    }

    fn detect_tool(&self, tool_type: &ToolType) -> (Option<String>, Option<String>) {
        let binary_name = tool_type.as_str();

        // 0. Explicit override
        if let Ok(path) = std::env::var(tool_type.env_override()) {
            if !path.trim().is_empty() {
                let version = self.get_version(&path, tool_type);
                return (version.as_ref().map(|_| path.clone()), version);
            }
        }

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            if std::path::Path::new(&path).exists() {
                let version = self.get_version(&path, tool_type);
                return (Some(path), version);
            }
        }

        // 2. Try PATH
        if let Ok(output) = Command::new("which").arg(binary_name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    let version = self.get_version(&path, tool_type);
                    return (Some(path), version);
                }
            }
        }

        debug!("[Tools] {} not found", binary_name);
        (None, None)
    }

    fn get_version(&self, path: &str, tool_type: &ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                // ffmpeg prints a banner; the first line carries the version
                let out = String::from_utf8_lossy(&output.stdout);
                out.lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}
