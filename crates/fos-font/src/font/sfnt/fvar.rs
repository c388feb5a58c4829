//! Font variations (fvar) table
//!
//! Descriptive only: axes and named instances are exposed, no interpolation
//! is performed.

use crate::font::reader::FontReader;
use crate::font::sfnt::name::NameTable;
use crate::{FontError, Result};

/// Variation axis
#[derive(Debug, Clone, PartialEq)]
pub struct VariationAxisRecord {
    pub tag: [u8; 4],
    pub min_value: f64,
    pub default_value: f64,
    pub max_value: f64,
    pub flags: u16,
    pub name_id: u16,
    pub name: Option<String>,
}

impl VariationAxisRecord {
    /// Axis tag as text, e.g. `wght`
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    /// Hidden axes should not be exposed in user interfaces
    pub fn is_hidden(&self) -> bool {
        self.flags & 0x0001 != 0
    }
}

/// Named instance
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    pub subfamily_name_id: u16,
    pub flags: u16,
    /// One user-space coordinate per axis
    pub coordinates: Vec<f64>,
    pub post_script_name_id: Option<u16>,
    pub subfamily_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FvarTable {
    pub axes: Vec<VariationAxisRecord>,
    pub instances: Vec<InstanceRecord>,
}

impl FvarTable {
    pub fn parse(data: &[u8], names: &NameTable) -> Result<Self> {
        let mut r = FontReader::new(data);
        let major = r.read_u16()?;
        let _minor = r.read_u16()?;
        if major != 1 {
            return Err(FontError::invalid("fvar", format!("unsupported version {major}")));
        }
        let axes_offset = r.read_u16()? as usize;
        r.skip(2)?; // reserved
        let axis_count = r.read_u16()? as usize;
        let axis_size = r.read_u16()? as usize;
        let instance_count = r.read_u16()? as usize;
        let instance_size = r.read_u16()? as usize;
        if axis_size < 20 {
            return Err(FontError::invalid("fvar", format!("axis record size {axis_size}")));
        }

        let mut axes = Vec::with_capacity(axis_count);
        for i in 0..axis_count {
            let mut a = FontReader::at(data, axes_offset + i * axis_size);
            let tag = a.read_tag()?;
            let min_value = a.read_fixed()?;
            let default_value = a.read_fixed()?;
            let max_value = a.read_fixed()?;
            let flags = a.read_u16()?;
            let name_id = a.read_u16()?;
            axes.push(VariationAxisRecord {
                tag,
                min_value,
                default_value,
                max_value,
                flags,
                name_id,
                name: names.get_by_id(name_id).map(str::to_string),
            });
        }

        let instances_offset = axes_offset + axis_count * axis_size;
        let has_post_script_name = instance_size >= 4 * axis_count + 6;
        let mut instances = Vec::with_capacity(instance_count);
        for i in 0..instance_count {
            let mut n = FontReader::at(data, instances_offset + i * instance_size);
            let subfamily_name_id = n.read_u16()?;
            let flags = n.read_u16()?;
            let coordinates = (0..axis_count)
                .map(|_| n.read_fixed())
                .collect::<Result<Vec<_>>>()?;
            let post_script_name_id = if has_post_script_name {
                Some(n.read_u16()?)
            } else {
                None
            };
            instances.push(InstanceRecord {
                subfamily_name_id,
                flags,
                coordinates,
                post_script_name_id,
                subfamily_name: names.get_by_id(subfamily_name_id).map(str::to_string),
            });
        }

        Ok(Self { axes, instances })
    }
}
