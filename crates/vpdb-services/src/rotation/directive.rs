use vpdb_core::AppError;
use vpdb_processing::RotationAngle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationRequest<'a> {
    pub file_id: &'a str,
    pub angle: RotationAngle,
}

/// Parsed `fileId:angle` list, e.g. `"abc123:90,def456:270"`.
///
/// A file listed twice keeps its last angle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationDirective {
    entries: Vec<(String, RotationAngle)>,
}

impl RotationDirective {
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let mut entries: Vec<(String, RotationAngle)> = Vec::new();
        for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (file_id, angle) = pair.split_once(':').ok_or_else(|| {
                AppError::BadRequest(
                    "When providing the \"rotation\" query, pairs must be separated by \":\"."
                        .to_string(),
                )
            })?;
            let angle = angle.trim();
            let angle = angle
                .parse::<u16>()
                .ok()
                .and_then(RotationAngle::from_degrees)
                .ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "Wrong angle \"{}\", must be one of: [0, 90, 180, 270].",
                        angle
                    ))
                })?;
            let file_id = file_id.trim().to_string();
            entries.retain(|(id, _)| *id != file_id);
            entries.push((file_id, angle));
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn requests(&self) -> impl Iterator<Item = RotationRequest<'_>> {
        self.entries.iter().map(|(file_id, angle)| RotationRequest {
            file_id,
            angle: *angle,
        })
    }

    pub fn file_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }
}
