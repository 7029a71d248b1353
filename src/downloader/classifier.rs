// Reference classification: decides which lookup path a raw reference takes

use super::models::ReferenceKind;

const METADATA_ID_LEN: usize = 22;
const VIDEO_ID_LEN: usize = 11;
const METADATA_DOMAIN_TOKEN: &str = "spotify";
const VIDEO_WATCH_PATH: &str = "youtube.com/watch?v=";

/// Classify a raw reference. Never fails; anything ambiguous is free text.
pub fn classify(raw: &str) -> ReferenceKind {
    if is_metadata_link(raw) {
        ReferenceKind::MetadataLink
    } else if is_video_link(raw) {
        ReferenceKind::VideoLink
    } else {
        ReferenceKind::FreeText
    }
}

/// Bare 22-character Spotify id, or anything mentioning spotify
pub fn is_metadata_link(raw: &str) -> bool {
    (raw.chars().count() == METADATA_ID_LEN && is_opaque(raw))
        || raw.contains(METADATA_DOMAIN_TOKEN)
}

/// Bare 11-character YouTube id with at least one uppercase letter, or a watch URL
pub fn is_video_link(raw: &str) -> bool {
    let bare_id = raw.chars().count() == VIDEO_ID_LEN
        && is_opaque(raw)
        && raw.to_lowercase() != raw;
    bare_id || raw.contains(VIDEO_WATCH_PATH)
}

// Unchanged by percent-encoding its spaces, i.e. no literal space
fn is_opaque(raw: &str) -> bool {
    raw.replace(' ', "%20") == raw
}
