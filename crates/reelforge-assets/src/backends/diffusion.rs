use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use reelforge_core::DiffusionConfig;

use super::scratch_file;
use crate::backend::{ImageGenerator, ImageRequest};
use crate::error::BackendError;

/// A local text-to-image tool driven by a command template.
///
/// `{prompt}`, `{output}`, `{width}` and `{height}` are substituted in each
/// argument before the command runs.
pub struct DiffusionGenerator {
    config: DiffusionConfig,
    scratch_dir: PathBuf,
}

impl DiffusionGenerator {
    pub fn new(config: DiffusionConfig, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn command_line(&self, request: &ImageRequest, output: &str) -> Vec<String> {
        self.config
            .command
            .iter()
            .map(|arg| {
                arg.replace("{prompt}", &request.prompt)
                    .replace("{output}", output)
                    .replace("{width}", &request.width.to_string())
                    .replace("{height}", &request.height.to_string())
            })
            .collect()
    }
}

#[async_trait]
impl ImageGenerator for DiffusionGenerator {
    fn name(&self) -> &str {
        "diffusion"
    }

    fn cache_tag(&self) -> String {
        format!("diffusion|{}", self.config.command.join(" "))
    }

    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let out = scratch_file(&self.scratch_dir, "diffusion", "png");
        let argv = self.command_line(request, &out.to_string_lossy());
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| BackendError::permanent("no diffusion command configured"))?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&out).await;
            return Err(BackendError::permanent(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let bytes = tokio::fs::read(&out).await.map_err(|e| {
            BackendError::permanent(format!("{} wrote no image: {}", program, e))
        })?;
        let _ = tokio::fs::remove_file(&out).await;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_substitution() {
        let generator = DiffusionGenerator::new(
            DiffusionConfig {
                command: vec![
                    "sd".into(),
                    "-p".into(),
                    "{prompt}".into(),
                    "-o".into(),
                    "{output}".into(),
                    "--size={width}x{height}".into(),
                ],
            },
            "/tmp",
        );
        let request = ImageRequest {
            query: "crab".into(),
            prompt: "a crab coding".into(),
            width: 540,
            height: 960,
            variant: 0,
        };
        assert_eq!(
            generator.command_line(&request, "/tmp/x.png"),
            vec!["sd", "-p", "a crab coding", "-o", "/tmp/x.png", "--size=540x960"]
        );
    }

    #[tokio::test]
    async fn test_empty_command_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let generator = DiffusionGenerator::new(DiffusionConfig { command: vec![] }, dir.path());
        let request = ImageRequest {
            query: String::new(),
            prompt: "x".into(),
            width: 8,
            height: 8,
            variant: 0,
        };
        assert!(!generator.generate(&request).await.unwrap_err().is_transient());
    }
}
