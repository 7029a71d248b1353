// Error types for the resolve → locate → acquire pipeline

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Metadata lookup yielded nothing (also covers provider auth/rate-limit failures)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Video search yielded nothing acceptable
    #[error("No matching video: {0}")]
    NoMatch(String),

    /// Transport failure while fetching the audio stream
    #[error("Download failed: {0}")]
    Download(String),

    /// External transcoder failed or the format pair is unsupported
    #[error("Transcode failed: {0}")]
    Transcode(String),

    /// Tag embedding failed; never fatal for the acquisition
    #[error("Tagging failed: {0}")]
    Tag(String),

    /// Explicit cancellation from an interactive prompt
    #[error("Aborted by user")]
    UserAbort,

    /// yt-dlp, ffmpeg or avconv not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Malformed link, extension or list file content
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl PipelineError {
    /// Failures the opt-in retry loop is allowed to re-attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Download(_) | Self::Transcode(_))
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Self::UserAbort)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

// Classify raw yt-dlp stderr
impl From<String> for PipelineError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        // Throttling shows up as timeouts against youtube.com or explicit 429s
        if lower.contains("429")
            || lower.contains("too many requests")
            || ((lower.contains("timeout") || lower.contains("timed out"))
                && lower.contains("youtube.com"))
        {
            return Self::Download(format!(
                "YouTube is throttling requests from this address, try again later ({})",
                s.trim()
            ));
        }

        if lower.contains("command not found") || lower.contains("no such file or directory") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("unsupported url") || lower.contains("invalid url") {
            return Self::InvalidInput(s);
        }

        Self::Download(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_throttling_as_download_error() {
        let err = PipelineError::from("HTTP Error 429: Too Many Requests".to_string());
        assert!(matches!(err, PipelineError::Download(ref m) if m.contains("throttling")));
        assert!(err.is_retryable());
    }

    #[test]
    fn classifies_missing_tool() {
        let err = PipelineError::from("sh: yt-dlp: command not found".to_string());
        assert!(matches!(err, PipelineError::ToolNotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn unsupported_url_is_invalid_input() {
        let err = PipelineError::from("ERROR: Unsupported URL: https://example.com".to_string());
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn only_abort_is_abort() {
        assert!(PipelineError::UserAbort.is_abort());
        assert!(!PipelineError::NoMatch("x".into()).is_abort());
    }
}
