// Test support utilities for both unit and integration tests

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{CatalogError, Result};
use crate::media::AudioFormat;
use crate::transcode::Transcoder;

/// One recorded `encode` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeCall {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: AudioFormat,
}

/// Fake transcoder that records every call instead of running an encoder
///
/// Unless told to fail, it only records. Set `write_output` to have it create
/// an empty file at the output path.
#[derive(Default)]
pub struct RecordingTranscoder {
    calls: Mutex<Vec<EncodeCall>>,
    fail: bool,
    write_output: bool,
}

impl RecordingTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcoder whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn writing_output() -> Self {
        Self {
            write_output: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<EncodeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transcoder for RecordingTranscoder {
    async fn encode(&self, input: &Path, output: &Path, format: AudioFormat) -> Result<()> {
        self.calls.lock().unwrap().push(EncodeCall {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            format,
        });

        if self.fail {
            return Err(CatalogError::Transcode {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                reason: "simulated encoder failure".to_string(),
            });
        }
        if self.write_output {
            tokio::fs::write(output, b"").await?;
        }
        Ok(())
    }
}
