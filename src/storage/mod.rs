mod download;
mod filename;

pub use download::{AudioStore, StoredAudioAsset, download_to_store};
pub use filename::{
    DEFAULT_AUDIO_EXTENSION, generate_filename, generate_filename_stem, id_hash,
    is_valid_audio_extension, sanitize_title,
};
