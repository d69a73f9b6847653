use image::codecs::jpeg::JpegEncoder;
use image::error::ImageFormatHint;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::error::VariationError;

const JPEG_QUALITY: u8 = 90;

/// Quarter-turn rotation angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationAngle {
    None,
    Quarter,
    Half,
    ThreeQuarters,
}

impl RotationAngle {
    pub const DEGREES: [u16; 4] = [0, 90, 180, 270];

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(RotationAngle::None),
            90 => Some(RotationAngle::Quarter),
            180 => Some(RotationAngle::Half),
            270 => Some(RotationAngle::ThreeQuarters),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            RotationAngle::None => 0,
            RotationAngle::Quarter => 90,
            RotationAngle::Half => 180,
            RotationAngle::ThreeQuarters => 270,
        }
    }

    /// Sum of two rotations, modulo a full turn.
    pub fn then(self, other: RotationAngle) -> RotationAngle {
        match (self.degrees() + other.degrees()) % 360 {
            90 => RotationAngle::Quarter,
            180 => RotationAngle::Half,
            270 => RotationAngle::ThreeQuarters,
            _ => RotationAngle::None,
        }
    }

    pub fn swaps_dimensions(self) -> bool {
        matches!(self, RotationAngle::Quarter | RotationAngle::ThreeQuarters)
    }
}

pub fn format_for_mime(mime_type: &str) -> Option<ImageFormat> {
    match mime_type {
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/png" => Some(ImageFormat::Png),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        other => other.extensions_str().first().copied().unwrap_or("unknown"),
    }
}

/// Decode bytes, guessing the format from content.
pub fn decode(data: &[u8]) -> Result<(DynamicImage, ImageFormat), VariationError> {
    let reader = image::ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| image::ImageError::Unsupported(ImageFormatHint::Unknown.into()))?;
    Ok((reader.decode()?, format))
}

/// Encode in `format`. JPEG drops alpha.
pub fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, VariationError> {
    let mut buffer = Vec::with_capacity(image.width() as usize * image.height() as usize);
    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
            rgb.write_with_encoder(encoder)?;
        }
        other => {
            image.write_to(&mut Cursor::new(&mut buffer), other)?;
        }
    }
    Ok(buffer)
}

/// Rotate encoded image bytes counter-clockwise, re-encoding in the source format.
///
/// `RotationAngle::None` returns the input untouched.
pub fn rotate_ccw(data: &[u8], angle: RotationAngle) -> Result<Vec<u8>, VariationError> {
    if angle == RotationAngle::None {
        return Ok(data.to_vec());
    }
    let (image, format) = decode(data)?;
    let rotated = match angle {
        RotationAngle::Quarter => image.rotate270(),
        RotationAngle::Half => image.rotate180(),
        RotationAngle::ThreeQuarters => image.rotate90(),
        RotationAngle::None => image,
    };
    encode(&rotated, format)
}

/// Fit within `width` x `height`, keeping the aspect ratio. Never upscales.
pub fn resize_bounded(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.width() <= width && image.height() <= height {
        return image.clone();
    }
    image.resize(width, height, FilterType::Lanczos3)
}

/// Cover `width` x `height` exactly, cropping the overflow around the center.
pub fn resize_fill(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    image.resize_to_fill(width, height, FilterType::Lanczos3)
}
