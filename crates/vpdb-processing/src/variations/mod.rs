//! Variation catalog and generators
//!
//! Which variations a file gets depends on its file type and MIME category.
//! Names are unique per category, so a name maps to one storage key no matter
//! which profile produced it.

mod catalog;
mod generator;

pub use catalog::{
    find_variation, possible_variation_names, variation_by_name, variation_names, variations_for, VariationKind,
    VariationSpec, FULL_SIZE,
};
pub use generator::{DefaultGenerator, VariationGenerator};
