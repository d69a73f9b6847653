use std::collections::BTreeSet;
use vpdb_core::models::{mime, FileType, MimeCategory};

/// Bound of the `full` image variation, in pixels.
pub const FULL_SIZE: u32 = 1920;

/// Height of the `small` video transcode.
const SMALL_VIDEO_HEIGHT: u32 = 478;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariationKind {
    /// Fit inside the box, never upscaling.
    Bounded { width: u32, height: u32 },
    /// Cover the box exactly, cropping overflow.
    Fill { width: u32, height: u32 },
    /// First frame as PNG.
    VideoStill,
    /// H.264 mp4 scaled to a fixed height.
    VideoTranscode { height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariationSpec {
    pub name: &'static str,
    pub kind: VariationKind,
}

impl VariationSpec {
    const fn bounded(name: &'static str, width: u32, height: u32) -> Self {
        Self {
            name,
            kind: VariationKind::Bounded { width, height },
        }
    }

    const fn fill(name: &'static str, width: u32, height: u32) -> Self {
        Self {
            name,
            kind: VariationKind::Fill { width, height },
        }
    }

    /// MIME type of the generated artifact.
    pub fn output_mime<'a>(&self, source_mime: &'a str) -> &'a str {
        match self.kind {
            VariationKind::VideoStill => "image/png",
            VariationKind::VideoTranscode { .. } => "video/mp4",
            _ => source_mime,
        }
    }

    /// File extension of the generated artifact.
    pub fn output_extension(&self, source_mime: &str) -> &'static str {
        mime::extension_for(self.output_mime(source_mime))
    }
}

const FULL: VariationSpec = VariationSpec::bounded("full", FULL_SIZE, FULL_SIZE);

const BACKGLASS: &[VariationSpec] = &[
    FULL,
    VariationSpec::bounded("medium", 364, 291),
    VariationSpec::bounded("medium-2x", 728, 582),
    VariationSpec::bounded("small", 253, 202),
    VariationSpec::bounded("small-2x", 506, 404),
];

const LOGO: &[VariationSpec] = &[
    FULL,
    VariationSpec::bounded("medium", 300, 130),
    VariationSpec::bounded("medium-2x", 600, 260),
];

const PLAYFIELD_FS: &[VariationSpec] = &[
    FULL,
    VariationSpec::bounded("medium", 393, 700),
    VariationSpec::bounded("medium-2x", 786, 1400),
    VariationSpec::fill("square", 120, 120),
];

const PLAYFIELD_WS: &[VariationSpec] = &[
    FULL,
    VariationSpec::bounded("medium", 700, 393),
    VariationSpec::bounded("medium-2x", 1400, 786),
    VariationSpec::fill("square", 120, 120),
];

const IMAGE_DEFAULT: &[VariationSpec] = &[FULL];

const VIDEO: &[VariationSpec] = &[
    VariationSpec {
        name: "still",
        kind: VariationKind::VideoStill,
    },
    VariationSpec {
        name: "small",
        kind: VariationKind::VideoTranscode {
            height: SMALL_VIDEO_HEIGHT,
        },
    },
];

fn profile(file_type: FileType, category: MimeCategory) -> &'static [VariationSpec] {
    match (category, file_type) {
        (MimeCategory::Image, FileType::Backglass) => BACKGLASS,
        (MimeCategory::Image, FileType::Logo) => LOGO,
        (MimeCategory::Image, FileType::PlayfieldFs) => PLAYFIELD_FS,
        (MimeCategory::Image, FileType::PlayfieldWs) => PLAYFIELD_WS,
        (MimeCategory::Image, _) => IMAGE_DEFAULT,
        (MimeCategory::Video, _) => VIDEO,
        _ => &[],
    }
}

/// Variations generated for a file of this type and category.
pub fn variations_for(file_type: FileType, category: MimeCategory) -> Vec<VariationSpec> {
    profile(file_type, category).to_vec()
}

pub fn variation_names(file_type: FileType, category: MimeCategory) -> Vec<&'static str> {
    profile(file_type, category).iter().map(|v| v.name).collect()
}

pub fn find_variation(
    file_type: FileType,
    category: MimeCategory,
    name: &str,
) -> Option<VariationSpec> {
    profile(file_type, category)
        .iter()
        .find(|v| v.name == name)
        .copied()
}

/// Look up a variation by name in any profile of `category`.
pub fn variation_by_name(category: MimeCategory, name: &str) -> Option<VariationSpec> {
    FileType::ALL
        .iter()
        .flat_map(|t| profile(*t, category).iter())
        .find(|v| v.name == name)
        .copied()
}

/// Every variation name any file type could have produced for `category`.
///
/// Rotation can move a playfield between profiles, so cleanup goes by this set
/// rather than a record's current type.
pub fn possible_variation_names(category: MimeCategory) -> BTreeSet<&'static str> {
    FileType::ALL
        .iter()
        .flat_map(|t| profile(*t, category).iter().map(|v| v.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_image_gets_full() {
        for file_type in [FileType::Backglass, FileType::Logo, FileType::Playfield, FileType::PlayfieldWs] {
            let names = variation_names(file_type, MimeCategory::Image);
            assert!(names.contains(&"full"), "{file_type} lacks full");
        }
    }

    #[test]
    fn playfield_profiles_are_transposed() {
        let fs = find_variation(FileType::PlayfieldFs, MimeCategory::Image, "medium").unwrap();
        let ws = find_variation(FileType::PlayfieldWs, MimeCategory::Image, "medium").unwrap();
        assert_eq!(fs.kind, VariationKind::Bounded { width: 393, height: 700 });
        assert_eq!(ws.kind, VariationKind::Bounded { width: 700, height: 393 });
    }

    #[test]
    fn videos_get_still_and_small() {
        let names = variation_names(FileType::PlayfieldFs, MimeCategory::Video);
        assert_eq!(names, vec!["still", "small"]);
        let still = find_variation(FileType::PlayfieldFs, MimeCategory::Video, "still").unwrap();
        assert_eq!(still.output_mime("video/mp4"), "image/png");
        assert_eq!(still.output_extension("video/mp4"), "png");
    }

    #[test]
    fn archives_have_no_variations() {
        assert!(variations_for(FileType::Release, MimeCategory::Archive).is_empty());
        assert!(variations_for(FileType::Rom, MimeCategory::Archive).is_empty());
    }

    #[test]
    fn names_are_unique_per_profile() {
        for file_type in FileType::ALL {
            for category in [MimeCategory::Image, MimeCategory::Video] {
                let names = variation_names(file_type, category);
                let unique: BTreeSet<_> = names.iter().collect();
                assert_eq!(unique.len(), names.len());
            }
        }
    }

    #[test]
    fn possible_names_cover_all_profiles() {
        let names = possible_variation_names(MimeCategory::Image);
        for expected in ["full", "medium", "medium-2x", "small", "small-2x", "square"] {
            assert!(names.contains(expected));
        }
        assert!(possible_variation_names(MimeCategory::Other).is_empty());
    }

    #[test]
    fn lookup_by_name_ignores_file_type() {
        let square = variation_by_name(MimeCategory::Image, "square").unwrap();
        assert_eq!(square.kind, VariationKind::Fill { width: 120, height: 120 });
        assert!(variation_by_name(MimeCategory::Audio, "square").is_none());
    }
}
