//! Image decoding, geometry and re-encoding

mod analyze;
mod transform;

pub use analyze::analyze;
pub use transform::{
    decode, encode, format_for_mime, format_name, resize_bounded, resize_fill, rotate_ccw,
    RotationAngle,
};
