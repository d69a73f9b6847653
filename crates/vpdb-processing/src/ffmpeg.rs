use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::VariationError;
use crate::probe::{validate_and_canonicalize, validate_binary, validate_path};

/// Runs `ffmpeg` for video variations
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    ffmpeg_path: String,
}

impl FfmpegRunner {
    pub fn new(ffmpeg_path: impl Into<String>) -> Result<Self, String> {
        let ffmpeg_path = ffmpeg_path.into();
        validate_binary(&ffmpeg_path, "ffmpeg")?;
        Ok(Self { ffmpeg_path })
    }

    /// Write the first frame of `input` as PNG.
    pub async fn extract_still(&self, input: &Path, output: &Path) -> Result<(), VariationError> {
        let args = vec![
            "-i".to_string(),
            Self::input_arg(input)?,
            "-vframes".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "image2".to_string(),
            "-vcodec".to_string(),
            "png".to_string(),
            "-y".to_string(),
            Self::output_arg(output)?,
        ];
        self.run(&args, "still").await
    }

    /// Transcode `input` to H.264 mp4 scaled to `height`, keeping the aspect ratio.
    pub async fn transcode_to_height(
        &self,
        input: &Path,
        output: &Path,
        height: u32,
    ) -> Result<(), VariationError> {
        let args = vec![
            "-i".to_string(),
            Self::input_arg(input)?,
            "-vf".to_string(),
            format!("scale=-2:{}", height),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            "-y".to_string(),
            Self::output_arg(output)?,
        ];
        self.run(&args, "transcode").await
    }

    fn input_arg(input: &Path) -> Result<String, VariationError> {
        validate_and_canonicalize(input)
            .map(|p| p.to_string_lossy().to_string())
            .map_err(VariationError::Ffmpeg)
    }

    fn output_arg(output: &Path) -> Result<String, VariationError> {
        let output = output.to_string_lossy().to_string();
        validate_path(&output).map_err(VariationError::Ffmpeg)?;
        Ok(output)
    }

    #[tracing::instrument(skip(self, args), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        ffmpeg.operation = operation
    ))]
    async fn run(&self, args: &[String], operation: &str) -> Result<(), VariationError> {
        let start = std::time::Instant::now();
        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| VariationError::Ffmpeg(format!("failed to execute ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VariationError::Ffmpeg(format!(
                "{} failed: {}",
                operation,
                stderr.trim()
            )));
        }

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "ffmpeg completed"
        );
        Ok(())
    }
}
