use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use vpdb_core::AppError;

/// One step of a configured reference path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    /// Every element of an array.
    Each,
}

/// Location of file references inside an entity document, such as
/// `versions[].files[]._file` or `_backglass`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Concrete locations of this path in `document`, in document order.
    ///
    /// Only leaves that are present and not null are returned.
    pub fn expand(&self, document: &Value) -> Vec<ConcretePath> {
        let mut out = Vec::new();
        expand_into(&self.segments, document, ConcretePath::default(), &mut out);
        out
    }
}

fn expand_into(
    segments: &[PathSegment],
    value: &Value,
    prefix: ConcretePath,
    out: &mut Vec<ConcretePath>,
) {
    let Some((head, rest)) = segments.split_first() else {
        if !value.is_null() {
            out.push(prefix);
        }
        return;
    };
    match head {
        PathSegment::Field(name) => {
            if let Some(child) = value.get(name.as_str()) {
                expand_into(rest, child, prefix.field(name), out);
            }
        }
        PathSegment::Each => {
            if let Some(items) = value.as_array() {
                for (index, item) in items.iter().enumerate() {
                    expand_into(rest, item, prefix.index(index), out);
                }
            }
        }
    }
}

impl FromStr for FieldPath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::InvalidInput(format!("Invalid reference path \"{}\"", s));
        let mut segments = Vec::new();
        for part in s.split('.') {
            let (name, each) = match part.strip_suffix("[]") {
                Some(name) => (name, true),
                None => (part, false),
            };
            if name.is_empty() || name.contains('[') || name.contains(']') {
                return Err(invalid());
            }
            segments.push(PathSegment::Field(name.to_string()));
            if each {
                segments.push(PathSegment::Each);
            }
        }
        Ok(Self { segments })
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut first = true;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathSegment::Each => f.write_str("[]")?,
            }
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConcreteSegment {
    Field(String),
    Index(usize),
}

/// A single resolved location, displayed as `versions.0.files.1._file`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConcretePath(Vec<ConcreteSegment>);

impl ConcretePath {
    fn field(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.0.push(ConcreteSegment::Field(name.to_string()));
        next
    }

    fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.0.push(ConcreteSegment::Index(index));
        next
    }

    pub fn get<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(document, |value, segment| match segment {
            ConcreteSegment::Field(name) => value.get(name.as_str()),
            ConcreteSegment::Index(index) => value.get(*index),
        })
    }

    pub fn get_mut<'a>(&self, document: &'a mut Value) -> Option<&'a mut Value> {
        self.0
            .iter()
            .try_fold(document, |value, segment| match segment {
                ConcreteSegment::Field(name) => value.get_mut(name.as_str()),
                ConcreteSegment::Index(index) => value.get_mut(*index),
            })
    }
}

impl Display for ConcretePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                ConcreteSegment::Field(name) => f.write_str(name)?,
                ConcreteSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}
