use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use reelforge_core::PiperConfig;
use reelforge_encode::wav;

use super::scratch_file;
use crate::backend::{Speech, SpeechBackend};
use crate::error::BackendError;

/// Local Piper TTS. Text goes in on stdin, a WAV file comes out.
pub struct PiperSpeech {
    config: PiperConfig,
    scratch_dir: PathBuf,
}

impl PiperSpeech {
    pub fn new(config: PiperConfig, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Piper's `--length_scale` is the inverse of a speed multiplier.
    pub fn length_scale(&self) -> f64 {
        if self.config.speed > 0.0 {
            1.0 / self.config.speed
        } else {
            1.0
        }
    }
}

#[async_trait]
impl SpeechBackend for PiperSpeech {
    fn name(&self) -> &str {
        "piper"
    }

    fn cache_tag(&self) -> String {
        format!("piper|{}|{}", self.config.model, self.config.speed)
    }

    fn is_heavy(&self) -> bool {
        self.config.heavy
    }

    async fn synthesize(&self, text: &str) -> Result<Speech, BackendError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let out = scratch_file(&self.scratch_dir, "piper", "wav");

        let mut child = Command::new(&self.config.binary)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_file")
            .arg(&out)
            .arg("--length_scale")
            .arg(format!("{:.3}", self.length_scale()))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let _ = tokio::fs::remove_file(&out).await;
            return Err(BackendError::permanent(format!(
                "piper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let bytes = tokio::fs::read(&out).await?;
        let _ = tokio::fs::remove_file(&out).await;
        let duration = wav::duration_from_bytes(&bytes)
            .ok_or_else(|| BackendError::permanent("piper produced an unreadable WAV"))?;

        Ok(Speech {
            bytes,
            duration,
            extension: "wav",
        })
    }
}
