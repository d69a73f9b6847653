//! Metadata extraction dispatched by MIME category

use async_trait::async_trait;
use std::path::Path;
use vpdb_core::models::{MediaDetails, Metadata, MimeCategory};
use vpdb_core::Config;

use crate::error::ExtractError;
use crate::probe::FfprobeProber;
use crate::{archive, checksum, imaging};

/// Reads structured metadata out of a stored binary.
///
/// Implementations must be idempotent: unchanged bytes yield identical
/// metadata, since rotation re-runs extraction on the same file.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, mime_type: &str, path: &Path) -> Result<Metadata, ExtractError>;
}

/// Extractor backed by the `image` crate, `ffprobe` and the `zip` crate
pub struct DefaultExtractor {
    prober: FfprobeProber,
}

impl DefaultExtractor {
    pub fn new(prober: FfprobeProber) -> Self {
        Self { prober }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let prober = FfprobeProber::new(config.ffprobe_path()).map_err(anyhow::Error::msg)?;
        Ok(Self::new(prober))
    }
}

#[async_trait]
impl MetadataExtractor for DefaultExtractor {
    #[tracing::instrument(skip(self, path), fields(category = tracing::field::Empty))]
    async fn extract(&self, mime_type: &str, path: &Path) -> Result<Metadata, ExtractError> {
        let start = std::time::Instant::now();
        let category = MimeCategory::from_mime(mime_type);
        tracing::Span::current().record("category", category.as_str());

        let details = match category {
            MimeCategory::Image => MediaDetails::Image(imaging::analyze(mime_type, path).await?),
            MimeCategory::Video => MediaDetails::Video(self.prober.probe_video(mime_type, path).await?),
            MimeCategory::Audio => MediaDetails::Audio(self.prober.probe_audio(mime_type, path).await?),
            MimeCategory::Archive => MediaDetails::Archive(archive::inspect(mime_type, path).await?),
            MimeCategory::Other => MediaDetails::Other,
        };

        let (checksum, size_bytes) = checksum::sha256_file(path)
            .await
            .map_err(|e| ExtractError::io(mime_type, e))?;

        tracing::debug!(
            size_bytes,
            duration_ms = start.elapsed().as_millis() as u64,
            "Metadata extracted"
        );

        Ok(Metadata {
            checksum,
            size_bytes,
            details,
        })
    }
}
