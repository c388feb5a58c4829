//! Font data model
//!
//! `TypeFace` -> `Font` -> `Glyph`. The model is built once per load and is
//! read-only afterwards, apart from each glyph's sample cache.

mod font;
mod glyph;
mod outline;
mod typeface;

pub use font::Font;
pub use glyph::{Glyph, SampledGlyph};
pub(crate) use glyph::link_components;
pub use outline::{
    CompositeComponent, Outline, OutlinePoint, OutlineSegment, OutlineType, SampledOutline,
};
pub use typeface::TypeFace;

pub use crate::font::sfnt::fvar::{InstanceRecord, VariationAxisRecord};
pub use crate::font::sfnt::name::NameId;
