use async_trait::async_trait;
use std::path::Path;
use vpdb_core::Config;

use super::catalog::{VariationKind, VariationSpec};
use crate::error::VariationError;
use crate::ffmpeg::FfmpegRunner;
use crate::imaging;

/// Derives one variation from the current original.
#[async_trait]
pub trait VariationGenerator: Send + Sync {
    /// Returns the encoded artifact. `source` is the original's local path.
    async fn generate(
        &self,
        spec: &VariationSpec,
        mime_type: &str,
        source: &Path,
    ) -> Result<Vec<u8>, VariationError>;
}

/// Generator using the `image` crate for images and `ffmpeg` for video
pub struct DefaultGenerator {
    ffmpeg: FfmpegRunner,
}

impl DefaultGenerator {
    pub fn new(ffmpeg: FfmpegRunner) -> Self {
        Self { ffmpeg }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let ffmpeg = FfmpegRunner::new(config.ffmpeg_path()).map_err(anyhow::Error::msg)?;
        Ok(Self::new(ffmpeg))
    }

    async fn image_variation(
        &self,
        kind: VariationKind,
        mime_type: &str,
        source: &Path,
    ) -> Result<Vec<u8>, VariationError> {
        let data = tokio::fs::read(source).await?;
        let target_format = imaging::format_for_mime(mime_type);

        tokio::task::spawn_blocking(move || {
            let (image, detected) = imaging::decode(&data)?;
            let resized = match kind {
                VariationKind::Bounded { width, height } => {
                    imaging::resize_bounded(&image, width, height)
                }
                VariationKind::Fill { width, height } => imaging::resize_fill(&image, width, height),
                VariationKind::VideoStill | VariationKind::VideoTranscode { .. } => image,
            };
            imaging::encode(&resized, target_format.unwrap_or(detected))
        })
        .await?
    }

    async fn video_variation(
        &self,
        spec: &VariationSpec,
        mime_type: &str,
        source: &Path,
    ) -> Result<Vec<u8>, VariationError> {
        let workdir = tempfile::tempdir()?;
        let output = workdir
            .path()
            .join(format!("{}.{}", spec.name, spec.output_extension(mime_type)));

        match spec.kind {
            VariationKind::VideoStill => self.ffmpeg.extract_still(source, &output).await?,
            VariationKind::VideoTranscode { height } => {
                self.ffmpeg.transcode_to_height(source, &output, height).await?
            }
            _ => {
                return Err(VariationError::Unsupported {
                    variation: spec.name.to_string(),
                    mime_type: mime_type.to_string(),
                })
            }
        }

        Ok(tokio::fs::read(&output).await?)
    }
}

#[async_trait]
impl VariationGenerator for DefaultGenerator {
    #[tracing::instrument(skip(self, spec, source), fields(variation = spec.name))]
    async fn generate(
        &self,
        spec: &VariationSpec,
        mime_type: &str,
        source: &Path,
    ) -> Result<Vec<u8>, VariationError> {
        match spec.kind {
            VariationKind::Bounded { .. } | VariationKind::Fill { .. }
                if imaging::format_for_mime(mime_type).is_some() =>
            {
                self.image_variation(spec.kind, mime_type, source).await
            }
            VariationKind::VideoStill | VariationKind::VideoTranscode { .. }
                if mime_type.starts_with("video/") =>
            {
                self.video_variation(spec, mime_type, source).await
            }
            _ => Err(VariationError::Unsupported {
                variation: spec.name.to_string(),
                mime_type: mime_type.to_string(),
            }),
        }
    }
}
