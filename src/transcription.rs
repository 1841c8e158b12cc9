use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ResolveError, TranscriptionError};

/// One timestamped sentence, times in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// End of the last sentence, or zero for an empty transcript
pub fn duration_of(sentences: &[Sentence]) -> f64 {
    sentences.last().map_or(0.0, |s| s.end)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Speech-to-text collaborator
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<Sentence>, TranscriptionError>;
}

/// Transcription capability, checked before use
#[derive(Clone, Default)]
pub enum Transcriber {
    #[default]
    Unconfigured,
    Configured(Arc<dyn TranscriptionBackend>),
}

impl Transcriber {
    pub fn new(backend: impl TranscriptionBackend + 'static) -> Self {
        Self::Configured(Arc::new(backend))
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }

    pub fn backend(&self) -> Result<&dyn TranscriptionBackend, ResolveError> {
        match self {
            Self::Configured(backend) => Ok(backend.as_ref()),
            Self::Unconfigured => Err(ResolveError::TranscriptionUnavailable),
        }
    }
}

impl std::fmt::Debug for Transcriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unconfigured => "Transcriber::Unconfigured",
            Self::Configured(_) => "Transcriber::Configured",
        })
    }
}

/// Settings for an OpenAI-compatible `audio/transcriptions` endpoint
#[derive(Debug, Clone)]
pub struct WhisperApiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub language: Option<String>,
    /// Files above this size are compressed before upload
    pub max_upload_bytes: u64,
    pub ffmpeg: String,
    pub timeout: Duration,
}

/// Whisper served over HTTP (Groq, OpenAI, or a compatible proxy)
pub struct WhisperApiBackend {
    client: reqwest::Client,
    settings: WhisperApiSettings,
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    text: String,
    start: f64,
    end: f64,
}

impl WhisperApiBackend {
    pub fn new(settings: WhisperApiSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperApiBackend {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<Sentence>, TranscriptionError> {
        let read_failed = |path: &Path, e: std::io::Error| TranscriptionError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        };

        let size = tokio::fs::metadata(audio_path)
            .await
            .map_err(|e| read_failed(audio_path, e))?
            .len();

        // Held until the upload finishes; the file is deleted when this drops
        let compressed = if size > self.settings.max_upload_bytes {
            info!(path = %audio_path.display(), size, "compressing audio before upload");
            Some(compress_for_upload(&self.settings.ffmpeg, audio_path).await?)
        } else {
            None
        };
        let upload_path = compressed.as_ref().map_or(audio_path, |f| f.path());

        let bytes = tokio::fs::read(upload_path)
            .await
            .map_err(|e| read_failed(upload_path, e))?;
        let file_name = upload_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let mut form = multipart::Form::new()
            .text("model", self.settings.model.clone())
            .text("response_format", "verbose_json")
            .text("temperature", "0")
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));
        if let Some(language) = &self.settings.language {
            form = form.text("language", language.clone());
        }

        debug!(endpoint = %self.endpoint(), model = %self.settings.model, "uploading audio for transcription");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        if !(200..300).contains(&status) {
            return Err(TranscriptionError::ApiStatus {
                status,
                body: String::from_utf8_lossy(&body).chars().take(500).collect(),
            });
        }

        parse_verbose_json(&body)
    }
}

fn parse_verbose_json(body: &[u8]) -> Result<Vec<Sentence>, TranscriptionError> {
    let parsed: VerboseTranscription = serde_json::from_slice(body)?;
    Ok(sentences_from_segments(parsed.segments))
}

/// Trim text, drop empty segments, round timestamps to two decimals
fn sentences_from_segments(segments: Vec<Segment>) -> Vec<Sentence> {
    segments
        .into_iter()
        .filter_map(|segment| {
            let text = segment.text.trim();
            (!text.is_empty()).then(|| Sentence {
                text: text.to_string(),
                start: round2(segment.start),
                end: round2(segment.end),
            })
        })
        .collect()
}

/// Transcode to mono 16 kHz 32 kbps MP3 in a temporary file
async fn compress_for_upload(ffmpeg: &str, input: &Path) -> Result<NamedTempFile, TranscriptionError> {
    let failed = |reason: String| TranscriptionError::CompressionFailed {
        path: input.to_path_buf(),
        reason,
    };

    let output_file = tempfile::Builder::new()
        .prefix("podresolve-upload-")
        .suffix(".mp3")
        .tempfile()
        .map_err(|e| failed(e.to_string()))?;
    let output_path: PathBuf = output_file.path().to_path_buf();

    let output = Command::new(ffmpeg)
        .arg("-y")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(input)
        .args(["-ac", "1", "-ar", "16000", "-b:a", "32k"])
        .arg(&output_path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| failed(format!("could not run {ffmpeg}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("{ffmpeg} exited with {}: {}", output.status, stderr.trim())));
    }

    Ok(output_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(end: f64) -> Sentence {
        Sentence {
            text: "x".to_string(),
            start: 0.0,
            end,
        }
    }

    #[test]
    fn duration_is_end_of_last_sentence() {
        assert_eq!(duration_of(&[sentence(1.2), sentence(8.75)]), 8.75);
    }

    #[test]
    fn duration_of_empty_transcript_is_zero() {
        assert_eq!(duration_of(&[]), 0.0);
    }

    #[test]
    fn parses_verbose_json_segments() {
        let body = br#"{
            "text": " Hello there. General Kenobi.",
            "segments": [
                {"id": 0, "text": " Hello there.", "start": 0.0, "end": 1.23456},
                {"id": 1, "text": "   ", "start": 1.3, "end": 1.4},
                {"id": 2, "text": " General Kenobi. ", "start": 1.5049, "end": 3.999}
            ]
        }"#;

        let sentences = parse_verbose_json(body).unwrap();

        assert_eq!(
            sentences,
            vec![
                Sentence {
                    text: "Hello there.".to_string(),
                    start: 0.0,
                    end: 1.23,
                },
                Sentence {
                    text: "General Kenobi.".to_string(),
                    start: 1.5,
                    end: 4.0,
                },
            ]
        );
    }

    #[test]
    fn missing_segments_is_empty_transcript() {
        assert!(parse_verbose_json(br#"{"text": ""}"#).unwrap().is_empty());
    }

    #[test]
    fn malformed_response_is_an_error() {
        assert!(matches!(
            parse_verbose_json(b"not json"),
            Err(TranscriptionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn unconfigured_transcriber_is_unavailable() {
        let transcriber = Transcriber::default();

        assert!(!transcriber.is_configured());
        assert!(matches!(
            transcriber.backend(),
            Err(ResolveError::TranscriptionUnavailable)
        ));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let backend = WhisperApiBackend::new(WhisperApiSettings {
            api_key: "key".to_string(),
            base_url: "https://api.groq.com/openai/v1/".to_string(),
            model: "whisper-large-v3".to_string(),
            language: Some("en".to_string()),
            max_upload_bytes: 25_000_000,
            ffmpeg: "ffmpeg".to_string(),
            timeout: Duration::from_secs(600),
        })
        .unwrap();

        assert_eq!(
            backend.endpoint(),
            "https://api.groq.com/openai/v1/audio/transcriptions"
        );
        assert!(Transcriber::new(backend).is_configured());
    }

    #[tokio::test]
    async fn missing_audio_file_is_read_failure() {
        let backend = WhisperApiBackend::new(WhisperApiSettings {
            api_key: "key".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            model: "m".to_string(),
            language: None,
            max_upload_bytes: 25_000_000,
            ffmpeg: "ffmpeg".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        let err = backend
            .transcribe(Path::new("/definitely/not/here.mp3"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::ReadFailed { .. }));
    }
}
