//! Font container parsing
//!
//! WOFF and WOFF2 files are unpacked into plain sfnt buffers first, so every
//! format ends up in the same [`sfnt::SfntPipeline`].

pub mod cff;
pub mod reader;
pub mod sfnt;
pub mod woff;
pub mod woff2;

use std::borrow::Cow;

use crate::config::LoadConfig;
use crate::detect::{detect, FontFormat};
use crate::model::TypeFace;
use crate::Result;

use sfnt::SfntPipeline;

/// Detect, unpack and load a font file
pub(crate) fn load_typeface(data: &[u8], extension: Option<&str>, config: &LoadConfig) -> Result<TypeFace> {
    let format = detect(data, extension)?;
    tracing::debug!("Loading {} font ({} bytes)", format.name(), data.len());

    let mut messages = Vec::new();
    let sfnts: Vec<Cow<'_, [u8]>> = match format {
        FontFormat::OpenType => vec![Cow::Borrowed(data)],
        FontFormat::Woff => woff::decode_woff(data)?
            .drain_into(&mut messages)
            .into_iter()
            .map(Cow::Owned)
            .collect(),
        FontFormat::Woff2 => woff2::decode_woff2(data)?
            .drain_into(&mut messages)
            .into_iter()
            .map(Cow::Owned)
            .collect(),
    };

    let pipeline = SfntPipeline::new(config);
    let mut fonts = Vec::with_capacity(sfnts.len());
    for sfnt in &sfnts {
        fonts.extend(pipeline.load_all(sfnt)?.drain_into(&mut messages));
    }

    let errors = messages.iter().filter(|m| m.is_error()).count();
    tracing::info!(
        "Loaded {} file: {} fonts, {} messages ({errors} errors)",
        format.name(),
        fonts.len(),
        messages.len()
    );
    Ok(TypeFace::new(fonts, messages, format))
}
