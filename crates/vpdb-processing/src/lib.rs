//! Media processing for stored files
//!
//! Two concerns live here: reading structured [`Metadata`](vpdb_core::models::Metadata)
//! out of a stored binary, and deriving variations (resized images, video
//! stills and transcodes) from it. Both operate on local file paths handed out
//! by the storage backend.

pub mod archive;
pub mod checksum;
pub mod error;
pub mod extractor;
pub mod ffmpeg;
pub mod imaging;
pub mod probe;
pub mod variations;

pub use error::{ExtractError, VariationError};
pub use extractor::{DefaultExtractor, MetadataExtractor};
pub use ffmpeg::FfmpegRunner;
pub use imaging::{rotate_ccw, RotationAngle};
pub use probe::FfprobeProber;
pub use variations::{
    find_variation, possible_variation_names, variation_by_name, variation_names, variations_for, DefaultGenerator,
    VariationGenerator, VariationKind, VariationSpec,
};
