//! Audio transcoding through an external encoder
//!
//! The catalog only relies on one contract: given an input path and a target
//! format, a playable file appears at the output path once `encode` returns
//! `Ok`. Encoder failures are surfaced, never swallowed.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{CatalogError, Result};
use crate::media::AudioFormat;
use crate::settings::TranscoderSettings;

/// Converts an audio file into another container (allows mocking for tests)
#[async_trait::async_trait]
pub trait Transcoder: Send + Sync {
    async fn encode(&self, input: &Path, output: &Path, format: AudioFormat) -> Result<()>;
}

/// Transcoder backed by an `ffmpeg` compatible command line tool
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    overwrite: bool,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::from_settings(&TranscoderSettings::default())
    }
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            overwrite: false,
        }
    }

    pub fn from_settings(settings: &TranscoderSettings) -> Self {
        Self {
            program: settings.program.clone(),
            overwrite: settings.overwrite,
        }
    }

    /// Arguments for one conversion, in invocation order
    fn args(&self, input: &Path, output: &Path, format: AudioFormat) -> Vec<String> {
        let mut args = Vec::with_capacity(7);
        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-i".to_string());
        args.push(input.display().to_string());
        args.push("-f".to_string());
        args.push(format.encoder_format().to_string());
        args.push(output.display().to_string());
        args
    }
}

#[async_trait::async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn encode(&self, input: &Path, output: &Path, format: AudioFormat) -> Result<()> {
        let failure = |reason: String| CatalogError::Transcode {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            reason,
        };

        debug!(
            "Transcoding {:?} -> {:?} ({}) with {:?}",
            input, output, format, self.program
        );

        let result = Command::new(&self.program)
            .args(self.args(input, output, format))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| failure(format!("failed to spawn {:?}: {}", self.program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim().to_string();
            warn!(
                "Encoder exited with {} for {:?}: {}",
                result.status, input, last_line
            );
            return Err(failure(format!("{}: {}", result.status, last_line)));
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(failure("encoder produced no output file".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_target_format() {
        let t = FfmpegTranscoder::new("ffmpeg");
        let args = t.args(Path::new("a.mp3"), Path::new("a.flac"), AudioFormat::Flac);
        assert_eq!(args, ["-i", "a.mp3", "-f", "flac", "a.flac"]);
    }

    #[test]
    fn test_default_never_overwrites() {
        let t = FfmpegTranscoder::default();
        let args = t.args(Path::new("b.flac"), Path::new("b.mp3"), AudioFormat::Mp3);
        assert!(!args.iter().any(|a| a == "-y"));
    }

    #[test]
    fn test_args_with_overwrite() {
        let t = FfmpegTranscoder::from_settings(&TranscoderSettings {
            program: PathBuf::from("/opt/ffmpeg"),
            overwrite: true,
        });
        let args = t.args(Path::new("b.flac"), Path::new("b.mp3"), AudioFormat::Mp3);
        assert_eq!(args, ["-y", "-i", "b.flac", "-f", "mp3", "b.mp3"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_transcode_failure() {
        let t = FfmpegTranscoder::new("/nonexistent/songbase-encoder");
        let err = t
            .encode(Path::new("a.mp3"), Path::new("a.flac"), AudioFormat::Flac)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Transcode { .. }));
    }
}
