// Concrete collaborators: metadata provider, video platform, transcoder

pub mod spotify;
pub mod transcoder;
pub mod ytdlp;

pub use spotify::{ClientCredentialsToken, SpotifyClient, SpotifyCredentials, TokenSource};
pub use transcoder::FfmpegTranscoder;
pub use ytdlp::YtDlpPlatform;
