use md5::{Digest, Md5};

/// Maximum number of characters kept from the title
const MAX_TITLE_LENGTH: usize = 50;

/// Hex characters of the id hash appended to every filename
const ID_HASH_LENGTH: usize = 8;

/// Extension used for direct downloads
pub const DEFAULT_AUDIO_EXTENSION: &str = "mp3";

/// Check if a character is allowed in filenames (whitelist approach)
fn is_valid_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_')
}

/// Keep whitelisted characters, trim, and cap at `MAX_TITLE_LENGTH`
pub fn sanitize_title(title: &str) -> String {
    let filtered: String = title.chars().filter(|c| is_valid_filename_char(*c)).collect();
    filtered.trim().chars().take(MAX_TITLE_LENGTH).collect()
}

/// First eight lowercase hex characters of the MD5 of an episode id
pub fn id_hash(id: &str) -> String {
    let digest = format!("{:x}", Md5::digest(id.as_bytes()));
    digest[..ID_HASH_LENGTH].to_string()
}

/// Filename stem: `<sanitized title>_<id hash>` with spaces as underscores
pub fn generate_filename_stem(title: &str, id: &str) -> String {
    format!("{}_{}", sanitize_title(title), id_hash(id)).replace(' ', "_")
}

/// Generate a complete filename for a direct download
pub fn generate_filename(title: &str, id: &str) -> String {
    format!(
        "{}.{}",
        generate_filename_stem(title, id),
        DEFAULT_AUDIO_EXTENSION
    )
}

/// Check if a string is a known audio container extension
pub fn is_valid_audio_extension(ext: &str) -> bool {
    matches!(
        ext.to_lowercase().as_str(),
        "mp3" | "m4a" | "mp4" | "aac" | "ogg" | "opus" | "wav" | "flac" | "webm"
    )
}
