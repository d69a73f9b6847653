use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use uuid::Uuid;
use vpdb_core::models::FileDescriptor;

/// PNG whose pixels encode their position, so every rotation changes the bytes.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("encode png fixture");
    buffer
}

pub fn image_dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).expect("decode stored image");
    (img.width(), img.height())
}

pub fn descriptor(file_type: &str, mime_type: &str, owner_id: Uuid) -> FileDescriptor {
    FileDescriptor {
        file_type: file_type.to_string(),
        mime_type: mime_type.to_string(),
        original_filename: format!("{}.{}", file_type, mime_type.rsplit('/').next().unwrap_or("bin")),
        owner_id,
        content_length: None,
    }
}
