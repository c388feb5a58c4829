//! Table visiting pipeline and outline strategies
//!
//! [`SfntPipeline`] walks a font's tables in priority order. Shared tables
//! (metrics, names, cmap, layout headers) are handled directly; outline
//! tables are delegated to an [`OutlineStrategy`] chosen from the font's
//! flavor: [`GlyfOutlines`] for `glyf`/`loca`, [`CffOutlines`] for
//! `CFF `/`CFF2`.

use std::collections::{BTreeMap, HashMap};

use crate::config::LoadConfig;
use crate::diagnostics::ParseOutcome;
use crate::font::cff::{self, CffFont};
use crate::geometry::Rect;
use crate::model::{link_components, Font, Glyph, OutlinePoint, OutlineType};
use crate::parallel;
use crate::{FontError, Result};

use super::cmap::CmapTable;
use super::fvar::FvarTable;
use super::glyf::{parse_glyph, parse_loca, GlyfRecord};
use super::kern::parse_kern;
use super::layout::{parse_gdef_glyph_classes, LayoutTable};
use super::lookup::LayoutKind;
use super::name::NameTable;
use super::post::PostTable;
use super::tables::{parse_metrics, HeadTable, HheaTable, MaxpTable, Metric, Os2Table};
use super::{parse_directories, tag_name, TableDirectory};

/// Tables decoded so far
#[derive(Debug, Default)]
pub struct TableState {
    pub head: Option<HeadTable>,
    pub maxp: Option<MaxpTable>,
    pub names: NameTable,
    pub cmap: CmapTable,
    pub hhea: Option<HheaTable>,
    pub hmtx: Vec<Metric>,
    pub fvar: Option<FvarTable>,
    pub vhea: Option<HheaTable>,
    pub vmtx: Vec<Metric>,
    pub os2: Option<Os2Table>,
    pub post: Option<PostTable>,
    pub glyph_classes: BTreeMap<u32, u16>,
    pub gpos: Option<LayoutTable>,
    pub gsub: Option<LayoutTable>,
    pub kerning: HashMap<u32, i16>,
}

impl TableState {
    pub fn head(&self) -> Result<&HeadTable> {
        self.head
            .as_ref()
            .ok_or_else(|| FontError::MissingTable("head".into()))
    }

    pub fn num_glyphs(&self) -> Result<u16> {
        self.maxp
            .as_ref()
            .map(|maxp| maxp.num_glyphs)
            .ok_or_else(|| FontError::MissingTable("maxp".into()))
    }
}

/// Outline handling for one font flavor
pub trait OutlineStrategy {
    fn outline_type(&self) -> OutlineType;

    /// Whether this strategy consumes the table
    fn handles(&self, tag: &[u8; 4]) -> bool;

    /// Decode one outline table; shared tables with a lower priority are
    /// already in `tables`
    fn load_table(&mut self, tag: &[u8; 4], data: &[u8], tables: &TableState) -> Result<ParseOutcome<()>>;

    /// Produce `num_glyphs` glyphs with outlines, bounds and names (if the
    /// outline format carries them)
    fn build_glyphs(self: Box<Self>, num_glyphs: usize, config: &LoadConfig) -> ParseOutcome<Vec<Glyph>>;
}

// ============================================================================
// TrueType outlines
// ============================================================================

/// `glyf`/`loca` outlines with deferred composite validation
#[derive(Debug, Default)]
pub struct GlyfOutlines {
    loca: Vec<u32>,
    records: Vec<GlyfRecord>,
}

impl OutlineStrategy for GlyfOutlines {
    fn outline_type(&self) -> OutlineType {
        OutlineType::TrueType
    }

    fn handles(&self, tag: &[u8; 4]) -> bool {
        tag == b"loca" || tag == b"glyf"
    }

    fn load_table(&mut self, tag: &[u8; 4], data: &[u8], tables: &TableState) -> Result<ParseOutcome<()>> {
        let mut outcome = ParseOutcome::clean(());
        match tag {
            b"loca" => {
                let format = tables.head()?.index_to_loc_format;
                self.loca = parse_loca(data, tables.num_glyphs()?, format)?;
            }
            b"glyf" => {
                let indices: Vec<usize> = (0..self.loca.len().saturating_sub(1)).collect();
                let loca = &self.loca;
                let parsed = parallel::map_ref(&indices, |&index| parse_glyph(data, loca, index));
                self.records = parsed
                    .into_iter()
                    .map(|glyph| glyph.drain_into(&mut outcome.messages))
                    .collect();
            }
            _ => {}
        }
        Ok(outcome)
    }

    fn build_glyphs(self: Box<Self>, num_glyphs: usize, config: &LoadConfig) -> ParseOutcome<Vec<Glyph>> {
        let mut outcome = ParseOutcome::clean(Vec::with_capacity(num_glyphs));

        // Second pass: composites are checked against the finished records;
        // their outlines come from the linked parts when sampled
        let composites: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| matches!(record, GlyfRecord::Composite { .. }))
            .map(|(index, _)| index)
            .collect();
        let records = &self.records;
        let depth = config.max_composite_depth;
        let resolve = |&index: &usize| validate_composite(records, index as u32, depth);
        let resolved = if composites.len() >= config.parallel_threshold {
            parallel::map_ref(&composites, resolve)
        } else {
            composites.iter().map(resolve).collect()
        };
        let mut resolved: HashMap<usize, std::result::Result<(), String>> =
            composites.into_iter().zip(resolved).collect();

        let mut records = self.records.into_iter();
        for index in 0..num_glyphs {
            let mut glyph = Glyph::new(index as u32, OutlineType::TrueType);
            match records.next() {
                Some(GlyfRecord::Simple { outlines, bounds }) => {
                    glyph.outlines = outlines;
                    glyph.bounds = bounds;
                }
                Some(GlyfRecord::Composite { components, bounds }) => {
                    glyph.components = components;
                    glyph.bounds = bounds;
                    if let Some(Err(reason)) = resolved.remove(&index) {
                        glyph.invalid = true;
                        outcome.error(format!("glyph {index}: {reason}"));
                    }
                }
                Some(GlyfRecord::Empty) => {}
                Some(GlyfRecord::Invalid) | None => glyph.invalid = true,
            }
            outcome.value.push(glyph);
        }
        outcome
    }
}

/// Check that a composite can be drawn from its components
///
/// Fails on references to missing or invalid glyphs, on cycles, and on
/// nesting deeper than `max_depth`.
pub(crate) fn validate_composite(
    records: &[GlyfRecord],
    index: u32,
    max_depth: usize,
) -> std::result::Result<(), String> {
    let mut visiting = Vec::new();
    visit_components(records, index, 0, max_depth, &mut visiting)
}

fn visit_components(
    records: &[GlyfRecord],
    index: u32,
    depth: usize,
    max_depth: usize,
    visiting: &mut Vec<u32>,
) -> std::result::Result<(), String> {
    if depth > max_depth {
        return Err(format!("composite nesting deeper than {max_depth}"));
    }
    match records.get(index as usize) {
        None => Err(format!("component glyph {index} does not exist")),
        Some(GlyfRecord::Empty | GlyfRecord::Simple { .. }) => Ok(()),
        Some(GlyfRecord::Invalid) => Err(format!("component glyph {index} is invalid")),
        Some(GlyfRecord::Composite { components, .. }) => {
            if visiting.contains(&index) {
                return Err(format!("composite cycle through glyph {index}"));
            }
            visiting.push(index);
            for component in components {
                visit_components(records, component.glyph_index, depth + 1, max_depth, visiting)?;
            }
            visiting.pop();
            Ok(())
        }
    }
}

// ============================================================================
// CFF outlines
// ============================================================================

/// `CFF `/`CFF2` charstring outlines
#[derive(Debug, Default)]
pub struct CffOutlines {
    font: Option<CffFont>,
}

impl OutlineStrategy for CffOutlines {
    fn outline_type(&self) -> OutlineType {
        OutlineType::Cff
    }

    fn handles(&self, tag: &[u8; 4]) -> bool {
        tag == b"CFF " || tag == b"CFF2"
    }

    fn load_table(&mut self, tag: &[u8; 4], data: &[u8], _tables: &TableState) -> Result<ParseOutcome<()>> {
        if self.font.is_some() {
            tracing::debug!("Ignoring '{}': outlines already loaded", tag_name(tag));
            return Ok(ParseOutcome::clean(()));
        }
        let parsed = if tag == b"CFF " {
            cff::parse_cff(data)?
        } else {
            cff::parse_cff2(data)?
        };
        Ok(parsed.map(|font| self.font = Some(font)))
    }

    fn build_glyphs(self: Box<Self>, num_glyphs: usize, _config: &LoadConfig) -> ParseOutcome<Vec<Glyph>> {
        let cff_glyphs = self.font.map(|font| font.glyphs).unwrap_or_default();
        let mut outcome = ParseOutcome::clean(Vec::with_capacity(num_glyphs));
        if cff_glyphs.len() != num_glyphs {
            outcome.warn(format!(
                "CFF has {} charstrings, maxp declares {num_glyphs} glyphs",
                cff_glyphs.len()
            ));
        }

        let mut cff_glyphs = cff_glyphs.into_iter();
        for index in 0..num_glyphs {
            let mut glyph = Glyph::new(index as u32, OutlineType::Cff);
            if let Some(cff_glyph) = cff_glyphs.next() {
                glyph.bounds = Rect::from_points(
                    cff_glyph
                        .outlines
                        .iter()
                        .flat_map(|outline| outline.points.iter().map(OutlinePoint::position)),
                )
                .unwrap_or_default();
                glyph.outlines = cff_glyph.outlines;
                glyph.name = cff_glyph.name;
                glyph.invalid = cff_glyph.invalid;
            }
            outcome.value.push(glyph);
        }
        outcome
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Builds [`Font`]s from sfnt table directories
pub struct SfntPipeline<'c> {
    config: &'c LoadConfig,
}

impl<'c> SfntPipeline<'c> {
    pub fn new(config: &'c LoadConfig) -> Self {
        Self { config }
    }

    /// Load every font of a plain sfnt or `ttcf` collection
    pub fn load_all(&self, data: &[u8]) -> Result<ParseOutcome<Vec<Font>>> {
        let directories = parse_directories(data)?;
        let mut outcome = ParseOutcome::clean(Vec::with_capacity(directories.len()));
        for directory in &directories {
            let font = self.load_font(directory)?.drain_into(&mut outcome.messages);
            outcome.value.push(font);
        }
        Ok(outcome)
    }

    /// Load one font
    pub fn load_font(&self, directory: &TableDirectory) -> Result<ParseOutcome<Font>> {
        directory.validate_mandatory()?;

        let mut strategy: Box<dyn OutlineStrategy> = if directory.has_cff_outlines() {
            Box::new(CffOutlines::default())
        } else {
            Box::new(GlyfOutlines::default())
        };
        let outline_type = strategy.outline_type();

        let mut outcome = ParseOutcome::clean(TableState::default());
        for record in directory.ordered_records() {
            let Some(data) = directory.table(&record.tag) else {
                continue;
            };
            tracing::debug!("Visiting '{}' ({} bytes)", tag_name(&record.tag), data.len());
            if strategy.handles(&record.tag) {
                let loaded = strategy.load_table(&record.tag, data, &outcome.value)?;
                outcome.messages.extend(loaded.messages);
            } else {
                visit_table(&record.tag, data, &mut outcome)?;
            }
        }

        let num_glyphs = outcome.value.num_glyphs()? as usize;
        let ParseOutcome {
            value: state,
            mut messages,
        } = outcome;
        let glyphs = strategy
            .build_glyphs(num_glyphs, self.config)
            .drain_into(&mut messages);
        let font = assemble(state, glyphs, outline_type)?;

        tracing::info!(
            "Loaded font '{}': {} glyphs, {} code points",
            font.family_name().unwrap_or("<unnamed>"),
            font.glyph_count(),
            font.unicode_map().len()
        );
        Ok(ParseOutcome::with_messages(font, messages))
    }
}

/// Decode one shared (non-outline) table into the state
///
/// Mandatory tables propagate structural errors. Optional tables that fail
/// to parse are dropped with a warning.
fn visit_table(tag: &[u8; 4], data: &[u8], outcome: &mut ParseOutcome<TableState>) -> Result<()> {
    match tag {
        b"head" => outcome.value.head = Some(HeadTable::parse(data)?),
        b"maxp" => outcome.value.maxp = Some(MaxpTable::parse(data)?),
        b"name" => outcome.value.names = NameTable::parse(data)?,
        b"cmap" => outcome.value.cmap = CmapTable::parse(data)?,
        b"hhea" => outcome.value.hhea = Some(HheaTable::parse(data)?),
        b"hmtx" => {
            let number_of_metrics = outcome
                .value
                .hhea
                .as_ref()
                .map(|hhea| hhea.number_of_metrics)
                .ok_or_else(|| FontError::MissingTable("hhea".into()))?;
            let metrics = parse_metrics(data, number_of_metrics, outcome.value.num_glyphs()?)?;
            outcome.value.hmtx = metrics;
        }
        b"fvar" => {
            let parsed = FvarTable::parse(data, &outcome.value.names);
            outcome.value.fvar = optional(outcome, tag, parsed);
        }
        b"vhea" => {
            let parsed = HheaTable::parse(data);
            outcome.value.vhea = optional(outcome, tag, parsed);
        }
        b"vmtx" => {
            let Some(number_of_metrics) = outcome.value.vhea.as_ref().map(|v| v.number_of_metrics) else {
                outcome.warn("vmtx: no usable vhea, table ignored");
                return Ok(());
            };
            let parsed = parse_metrics(data, number_of_metrics, outcome.value.num_glyphs()?);
            outcome.value.vmtx = optional(outcome, tag, parsed).unwrap_or_default();
        }
        b"OS/2" => {
            let parsed = Os2Table::parse(data);
            outcome.value.os2 = optional(outcome, tag, parsed);
        }
        b"post" => {
            let parsed = PostTable::parse(data);
            outcome.value.post = optional(outcome, tag, parsed);
        }
        b"GDEF" => {
            let parsed = parse_gdef_glyph_classes(data);
            outcome.value.glyph_classes = optional(outcome, tag, parsed).unwrap_or_default();
        }
        b"GPOS" => {
            let parsed = LayoutTable::parse(data, LayoutKind::Gpos);
            outcome.value.gpos = optional(outcome, tag, parsed);
        }
        b"GSUB" => {
            let parsed = LayoutTable::parse(data, LayoutKind::Gsub);
            outcome.value.gsub = optional(outcome, tag, parsed);
        }
        b"kern" => {
            let parsed = parse_kern(data);
            if let Some(kern) = optional(outcome, tag, parsed) {
                outcome.value.kerning = kern.drain_into(&mut outcome.messages);
            }
        }
        _ => {}
    }
    Ok(())
}

fn optional<T>(outcome: &mut ParseOutcome<TableState>, tag: &[u8; 4], parsed: Result<T>) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(e) => {
            outcome.warn(format!("{}: {e}, table ignored", tag_name(tag)));
            None
        }
    }
}

/// Merge per-glyph data from the shared tables into the glyphs, then link
/// composites to their parts
fn assemble(state: TableState, mut glyphs: Vec<Glyph>, outline_type: OutlineType) -> Result<Font> {
    let head = state.head.ok_or_else(|| FontError::MissingTable("head".into()))?;
    let maxp = state.maxp.ok_or_else(|| FontError::MissingTable("maxp".into()))?;
    let hhea = state.hhea.ok_or_else(|| FontError::MissingTable("hhea".into()))?;

    let mut unicodes = state.cmap.glyph_to_unicodes();
    let post_names = state
        .post
        .as_ref()
        .map(|post| post.glyph_names.as_slice())
        .unwrap_or_default();

    let mut name_map = HashMap::with_capacity(glyphs.len());
    for glyph in &mut glyphs {
        let index = glyph.index as usize;
        if let Some(metric) = state.hmtx.get(index) {
            glyph.advance_width = metric.advance;
            glyph.lsb = metric.side_bearing;
        }
        if let Some(metric) = state.vmtx.get(index) {
            glyph.advance_height = metric.advance;
            glyph.tsb = metric.side_bearing;
        }
        if glyph.name.is_none() {
            glyph.name = post_names.get(index).cloned();
        }
        glyph.unicodes = unicodes.remove(&glyph.index).unwrap_or_default();
        glyph.glyph_class = state.glyph_classes.get(&glyph.index).copied();
        if let Some(name) = &glyph.name {
            name_map.entry(name.clone()).or_insert(glyph.index);
        }
    }

    let (axes, instances) = state
        .fvar
        .map(|fvar| (fvar.axes, fvar.instances))
        .unwrap_or_default();

    Ok(Font {
        head,
        maxp,
        hhea,
        vhea: state.vhea,
        os2: state.os2,
        post: state.post,
        names: state.names,
        outline_type,
        glyphs: link_components(glyphs),
        cmap: state.cmap,
        axes,
        instances,
        gpos: state.gpos,
        gsub: state.gsub,
        name_map,
        kerning: state.kerning,
    })
}
