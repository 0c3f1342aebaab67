use serde::{Deserialize, Serialize};

use crate::fixed::Fixed;

/// Map-thing type reserved for slope reference vertices.
pub const SLOPE_VERTEX_THING_TYPE: u16 = 750;
/// Line special whose front sector floor drives a tagged slope vertex height.
pub const SLOPE_HEIGHT_SPECIAL: i16 = 799;
/// Shift extracting the encoded z offset from a map thing's option bits.
pub const THING_Z_SHIFT: u16 = 4;

/// Line flag bits consumed by slope spawning.
pub mod line_flags {
    /// Slopes spawned from this line ignore physics interactions.
    pub const SLOPE_NO_PHYSICS: u16 = 0x0001;
    /// Slopes spawned from this line recompute when their sources move.
    pub const SLOPE_DYNAMIC: u16 = 0x0002;
    /// Vertex slope reference tags come from the bound side's offsets.
    pub const SLOPE_SPLIT_TAGS: u16 = 0x0004;
}

/// Stable identifier of a slope in the engine's registry. The map only
/// stores references; the registry owns the planes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlopeId(u16);

impl SlopeId {
    pub const fn new(raw: u16) -> SlopeId {
        SlopeId(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Vertex {
    pub x: Fixed,
    pub y: Fixed,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Side {
    #[serde(default)]
    pub texture_offset: Fixed,
    #[serde(default)]
    pub row_offset: Fixed,
    pub sector: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Line {
    pub v1: usize,
    pub v2: usize,
    #[serde(default)]
    pub flags: u16,
    #[serde(default)]
    pub special: i16,
    #[serde(default)]
    pub tag: u16,
    #[serde(default)]
    pub front_sector: Option<usize>,
    #[serde(default)]
    pub back_sector: Option<usize>,
    #[serde(default)]
    pub front_side: Option<usize>,
    #[serde(default)]
    pub back_side: Option<usize>,
}

/// A stacked "fake floor" inside a sector, driven by a control sector whose
/// floor and ceiling supply the bottom and top planes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FakeFloor {
    pub control: usize,
}

/// One entry of a sector's light list: a flat height or an attached slope.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LightLevel {
    pub height: Fixed,
    #[serde(default)]
    pub slope: Option<SlopeId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Sector {
    pub floor_height: Fixed,
    pub ceiling_height: Fixed,
    #[serde(default)]
    pub tag: u16,
    /// Boundary lines, by index into [`LevelData::lines`].
    #[serde(default)]
    pub lines: Vec<usize>,
    #[serde(default)]
    pub floor_slope: Option<SlopeId>,
    #[serde(default)]
    pub ceiling_slope: Option<SlopeId>,
    #[serde(default)]
    pub has_slope: bool,
    #[serde(default)]
    pub fake_floors: Vec<FakeFloor>,
    #[serde(default)]
    pub light_list: Vec<LightLevel>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapThing {
    /// Position in whole map units.
    pub x: i32,
    pub y: i32,
    /// For slope vertices the angle field carries the matching tag.
    #[serde(default)]
    pub angle: u16,
    pub kind: u16,
    #[serde(default)]
    pub options: u16,
    /// When set, `options` is an absolute height instead of a floor offset.
    #[serde(default)]
    pub extra_info: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LevelData {
    pub vertices: Vec<Vertex>,
    pub sides: Vec<Side>,
    pub lines: Vec<Line>,
    pub sectors: Vec<Sector>,
    #[serde(default)]
    pub things: Vec<MapThing>,
}

impl LevelData {
    pub fn line_delta(&self, line: usize) -> (Fixed, Fixed) {
        let l = &self.lines[line];
        let v1 = self.vertices[l.v1];
        let v2 = self.vertices[l.v2];
        (v2.x - v1.x, v2.y - v1.y)
    }

    /// Projects (x, y) onto the infinite line through the given line's
    /// vertices and returns the projected point.
    pub fn closest_point_on_line(&self, x: Fixed, y: Fixed, line: usize) -> (Fixed, Fixed) {
        let l = &self.lines[line];
        let v1 = self.vertices[l.v1];
        let v2 = self.vertices[l.v2];
        let (ax, ay) = (v1.x.raw() as i64, v1.y.raw() as i64);
        let dx = v2.x.raw() as i64 - ax;
        let dy = v2.y.raw() as i64 - ay;
        let den = dx * dx + dy * dy;
        if den == 0 {
            return (v1.x, v1.y);
        }
        let num = (x.raw() as i64 - ax) * dx + (y.raw() as i64 - ay) * dy;
        let px = ax + ((dx as i128 * num as i128) / den as i128) as i64;
        let py = ay + ((dy as i128 * num as i128) / den as i128) as i64;
        (
            Fixed::from_raw(px.clamp(i32::MIN as i64, i32::MAX as i64) as i32),
            Fixed::from_raw(py.clamp(i32::MIN as i64, i32::MAX as i64) as i32),
        )
    }

    pub fn sectors_with_tag(&self, tag: u16) -> Vec<usize> {
        self.sectors
            .iter()
            .enumerate()
            .filter(|(_, s)| s.tag == tag)
            .map(|(i, _)| i)
            .collect()
    }

    /// First line carrying both the given special and tag.
    pub fn find_special_line_from_tag(&self, special: i16, tag: u16) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.special == special && l.tag == tag)
    }

    /// Locates the sector containing (x, y) by an even-odd crossing test
    /// over each sector's boundary lines.
    pub fn sector_at_point(&self, x: Fixed, y: Fixed) -> Option<usize> {
        let px = x.raw() as f64;
        let py = y.raw() as f64;
        for (idx, sector) in self.sectors.iter().enumerate() {
            let mut inside = false;
            for &li in &sector.lines {
                let l = &self.lines[li];
                let a = self.vertices[l.v1];
                let b = self.vertices[l.v2];
                let (ax, ay) = (a.x.raw() as f64, a.y.raw() as f64);
                let (bx, by) = (b.x.raw() as f64, b.y.raw() as f64);
                if (ay > py) != (by > py) {
                    let ix = ax + (py - ay) / (by - ay) * (bx - ax);
                    if px < ix {
                        inside = !inside;
                    }
                }
            }
            if inside {
                return Some(idx);
            }
        }
        None
    }
}
