use log::{debug, warn};
use thiserror::Error;

use talus_map::{
    line_flags, point_to_dist2, Angle, Fixed, LevelData, LightLevel, SlopeId, Vec2, Vec3,
    SLOPE_VERTEX_THING_TYPE, THING_Z_SHIFT,
};

use crate::scheduler::{DynSlopeScheduler, DynSlopeTask, LineQuadrant};

/// Slope flag bits.
pub mod slope_flags {
    /// Objects on this slope keep flat-ground physics.
    pub const NO_PHYSICS: u8 = 0x01;
    /// The plane never recomputes after spawn.
    pub const NO_DYNAMIC: u8 = 0x02;
}

#[derive(Debug, Error)]
pub enum SlopeError {
    /// A vertex-defined slope could not resolve one of its three reference
    /// points. There is no safe partial-slope fallback, so level setup
    /// aborts.
    #[error("slope vertex {index} (tag {tag}) not found")]
    MissingVertex { index: usize, tag: u16 },
}

/// A tilted plane: origin point, horizontal direction of steepest descent,
/// rise per unit run, and the derived normal and angles. The `real_*`
/// angle copies keep the computed values even when degenerate geometry
/// forces the working pair flat.
#[derive(Clone, Debug)]
pub struct Slope {
    pub origin: Vec3,
    pub direction: Vec2,
    pub zdelta: Fixed,
    pub normal: Vec3,
    pub zangle: Angle,
    pub xydirection: Angle,
    pub real_zangle: Angle,
    pub real_xydirection: Angle,
    pub flags: u8,
    pub id: SlopeId,
    /// Bumped whenever a recompute actually changes the plane.
    pub generation: u32,
}

impl Slope {
    pub fn has_physics(&self) -> bool {
        self.flags & slope_flags::NO_PHYSICS == 0
    }

    /// Height of the plane at an arbitrary horizontal position.
    pub fn z_at(&self, x: Fixed, y: Fixed) -> Fixed {
        let dist = (x - self.origin.x).mul(self.direction.x)
            + (y - self.origin.y).mul(self.direction.y);
        self.origin.z + dist.mul(self.zdelta)
    }

    /// Rebuilds the normal from the tilt angle and direction vector.
    pub fn calculate_normal(&mut self) {
        let fine = self.zangle.fine();
        self.normal.z = talus_map::fine_cosine(fine);
        self.normal.x = talus_map::fine_sine(fine).mul(self.direction.x);
        self.normal.y = talus_map::fine_sine(fine).mul(self.direction.y);
    }

    /// Rotates a momentum vector from flat-ground space into the slope's
    /// plane. No-op when physics is disabled.
    pub fn quantize_momentum(&self, momentum: &mut Vec3) {
        if !self.has_physics() {
            return;
        }
        self.rotate_by_fine(momentum, self.zangle.fine());
    }

    /// Inverse of [`Slope::quantize_momentum`]: rotates by the inverted tilt
    /// to re-express slope-relative momentum against flat ground.
    pub fn reverse_quantize_momentum(&self, momentum: &mut Vec3) {
        if !self.has_physics() {
            return;
        }
        self.rotate_by_fine(momentum, self.zangle.invert().fine());
    }

    fn rotate_by_fine(&self, momentum: &mut Vec3, fine: usize) {
        let axis = Vec3::new(-self.direction.y, self.direction.x, Fixed::ZERO);
        *momentum = momentum.rotated_about(
            axis,
            talus_map::fine_cosine(fine),
            talus_map::fine_sine(fine),
        );
    }

    /// Refits the plane through three reference points.
    ///
    /// The numeric recipe is deliberate and load-bearing: fixed-point cross
    /// products overflow easily, so both edge vectors are downscaled by the
    /// largest component magnitude first, and the normal's magnitude is
    /// recovered as a hypotenuse of a hypotenuse rather than a direct 3D
    /// magnitude (which is unreliable at this precision). The sign flip for
    /// down-facing normals and the exactly-horizontal fallback both stay as
    /// they are; the alternative formulas behave worse in some maps.
    pub fn reconfigure_via_vertexes(&mut self, v1: Vec3, v2: Vec3, v3: Vec3) {
        self.origin = v1;
        let vec1 = v2.sub(v1);
        let vec2 = v3.sub(v1);

        if vec1.z == Fixed::ZERO && vec2.z == Fixed::ZERO {
            self.make_flat();
            return;
        }

        let m = Fixed::from_raw(
            vec1.max_component_abs()
                .max(vec2.max_component_abs())
                .raw()
                >> 5,
        );

        self.normal = vec1.div_scalar(m).cross(vec2.div_scalar(m));

        let mut mag = Fixed::hypot(
            Fixed::hypot(self.normal.x, self.normal.y),
            self.normal.z,
        );
        if self.normal.z < Fixed::ZERO {
            mag = -mag;
        }
        self.normal = self.normal.div_scalar(mag);

        let horizontal = Fixed::hypot(self.normal.x, self.normal.y);
        self.direction.x = -self.normal.x.div(horizontal);
        self.direction.y = -self.normal.y.div(horizontal);
        self.zdelta = horizontal.div(self.normal.z);

        self.real_xydirection =
            Angle::point_to_angle2(Fixed::ZERO, Fixed::ZERO, self.direction.x, self.direction.y)
                + Angle::HALF;
        self.real_zangle =
            Angle::point_to_angle2(Fixed::ZERO, Fixed::ZERO, Fixed::UNIT, self.zdelta).invert();

        if self.normal.x == Fixed::ZERO && self.normal.y == Fixed::ZERO {
            self.make_flat();
        } else {
            self.xydirection = self.real_xydirection;
            self.zangle = self.real_zangle;
        }
    }

    fn make_flat(&mut self) {
        self.zangle = Angle::ZERO;
        self.xydirection = Angle::ZERO;
        self.zdelta = Fixed::ZERO;
        self.direction = Vec2::ZERO;
    }
}

/// Owns every slope of the current map. Identifiers are assigned in
/// creation order and stay stable for the map's lifetime, which keeps them
/// reproducible across peers loading the same map data.
#[derive(Debug, Default)]
pub struct SlopeRegistry {
    slopes: Vec<Slope>,
}

impl SlopeRegistry {
    pub fn new() -> SlopeRegistry {
        SlopeRegistry::default()
    }

    /// Drops every slope; run at map unload.
    pub fn reset(&mut self) {
        self.slopes.clear();
    }

    pub fn len(&self) -> usize {
        self.slopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slope> {
        self.slopes.iter()
    }

    pub fn get(&self, id: SlopeId) -> &Slope {
        &self.slopes[(id.raw() - 1) as usize]
    }

    pub fn get_mut(&mut self, id: SlopeId) -> &mut Slope {
        &mut self.slopes[(id.raw() - 1) as usize]
    }

    /// Lookup by raw identifier, for net-sync paths that ship ids across
    /// the wire.
    pub fn by_id(&self, raw: u16) -> Option<&Slope> {
        self.slopes.iter().find(|s| s.id.raw() == raw)
    }

    pub(crate) fn add(&mut self, flags: u8) -> SlopeId {
        let id = SlopeId::new(self.slopes.len() as u16 + 1);
        self.slopes.push(Slope {
            origin: Vec3::ZERO,
            direction: Vec2::ZERO,
            zdelta: Fixed::ZERO,
            normal: Vec3::ZERO,
            zangle: Angle::ZERO,
            xydirection: Angle::ZERO,
            real_zangle: Angle::ZERO,
            real_xydirection: Angle::ZERO,
            flags,
            id,
            generation: 0,
        });
        id
    }
}

/// Scans the level's lines and spawns every slope they define. Copy
/// specials run in a second pass so their source slopes exist first. When
/// loading from a save the registry is rebuilt without queuing thinkers;
/// creation order (and therefore every id) matches the original session.
pub fn spawn_level_slopes(
    level: &mut LevelData,
    slopes: &mut SlopeRegistry,
    sched: &mut DynSlopeScheduler,
    from_save: bool,
) -> Result<(), SlopeError> {
    for i in 0..level.lines.len() {
        match level.lines[i].special {
            700 | 701 | 702 | 703 | 710 | 711 | 712 | 713 => {
                spawn_via_line(level, slopes, sched, i, !from_save);
            }
            704 | 705 | 714 | 715 => {
                spawn_via_vertexes(level, slopes, sched, i, !from_save)?;
            }
            _ => {}
        }
    }
    for i in 0..level.lines.len() {
        if matches!(level.lines[i].special, 720..=722) {
            copy_sector_slope(level, i);
        }
    }
    Ok(())
}

fn line_slope_flags(flags: u16) -> u8 {
    let mut out = 0;
    if flags & line_flags::SLOPE_NO_PHYSICS != 0 {
        out |= slope_flags::NO_PHYSICS;
    }
    if flags & line_flags::SLOPE_DYNAMIC == 0 {
        out |= slope_flags::NO_DYNAMIC;
    }
    out
}

/// Furthest perpendicular distance from the control line to any other
/// boundary vertex of the sector. This is the run over which the far
/// sector's height applies, precomputed once and reused every tick by the
/// dynamic task.
fn get_extent(level: &LevelData, sector: usize, line: usize) -> Fixed {
    let mut fardist = -Fixed::UNIT;
    for &li in &level.sectors[sector].lines {
        if li == line {
            continue;
        }
        let l = &level.lines[li];
        for vi in [l.v1, l.v2] {
            let v = level.vertices[vi];
            let (px, py) = level.closest_point_on_line(v.x, v.y, line);
            let dist = point_to_dist2(px, py, v.x, v.y);
            if dist > fardist {
                fardist = dist;
            }
        }
    }
    fardist
}

fn spawn_via_line(
    level: &mut LevelData,
    slopes: &mut SlopeRegistry,
    sched: &mut DynSlopeScheduler,
    linenum: usize,
    spawn_thinker: bool,
) {
    let line = level.lines[linenum].clone();
    let special = line.special;

    let front_floor = matches!(special, 700 | 702 | 703);
    let back_floor = matches!(special, 710 | 712 | 713);
    let front_ceil = matches!(special, 701 | 702 | 713);
    let back_ceil = matches!(special, 711 | 712 | 703);

    let flags = line_slope_flags(line.flags);

    let (Some(front), Some(back)) = (line.front_sector, line.back_sector) else {
        debug!(
            "slope special {} used on a line without two sides (line {})",
            special, linenum
        );
        return;
    };

    let (dx, dy) = level.line_delta(linenum);
    let len = point_to_dist2(Fixed::ZERO, Fixed::ZERO, dx, dy);
    let nx = dy.div(len);
    let ny = -dx.div(len);

    let v1 = level.vertices[line.v1];
    let v2 = level.vertices[line.v2];
    let origin_x = v1.x + (v2.x - v1.x) / 2;
    let origin_y = v1.y + (v2.y - v1.y) / 2;

    if front_floor || front_ceil {
        level.sectors[front].has_slope = true;

        let extent = get_extent(level, front, linenum);
        if extent < Fixed::ZERO {
            warn!(
                "failed to resolve the front sector extent on line {}",
                linenum
            );
            return;
        }

        // Reposition the origin to the far edge of the driven sector; the
        // direction then points back toward the control line.
        let point_x = origin_x + nx.mul(extent);
        let point_y = origin_y + ny.mul(extent);
        let direction = Vec2::new(-nx, -ny);

        if front_floor {
            let origin_z = level.sectors[back].floor_height;
            let point_z = level.sectors[front].floor_height;
            let id = make_line_slope(
                slopes,
                Vec3::new(point_x, point_y, point_z),
                direction,
                (origin_z, point_z),
                (origin_x, origin_y),
                extent,
                flags,
            );
            level.sectors[front].floor_slope = Some(id);
            if spawn_thinker && flags & slope_flags::NO_DYNAMIC == 0 {
                sched.queue(DynSlopeTask::line(id, linenum, extent, LineQuadrant::FrontFloor));
            }
        }
        if front_ceil {
            let origin_z = level.sectors[back].ceiling_height;
            let point_z = level.sectors[front].ceiling_height;
            let id = make_line_slope(
                slopes,
                Vec3::new(point_x, point_y, point_z),
                direction,
                (origin_z, point_z),
                (origin_x, origin_y),
                extent,
                flags,
            );
            level.sectors[front].ceiling_slope = Some(id);
            if spawn_thinker && flags & slope_flags::NO_DYNAMIC == 0 {
                sched.queue(DynSlopeTask::line(
                    id,
                    linenum,
                    extent,
                    LineQuadrant::FrontCeiling,
                ));
            }
        }
    }
    if back_floor || back_ceil {
        level.sectors[back].has_slope = true;

        let extent = get_extent(level, back, linenum);
        if extent < Fixed::ZERO {
            warn!(
                "failed to resolve the back sector extent on line {}",
                linenum
            );
            return;
        }

        let point_x = origin_x + (-nx).mul(extent);
        let point_y = origin_y + (-ny).mul(extent);
        let direction = Vec2::new(nx, ny);

        if back_floor {
            let origin_z = level.sectors[front].floor_height;
            let point_z = level.sectors[back].floor_height;
            let id = make_line_slope(
                slopes,
                Vec3::new(point_x, point_y, point_z),
                direction,
                (origin_z, point_z),
                (origin_x, origin_y),
                extent,
                flags,
            );
            level.sectors[back].floor_slope = Some(id);
            if spawn_thinker && flags & slope_flags::NO_DYNAMIC == 0 {
                sched.queue(DynSlopeTask::line(id, linenum, extent, LineQuadrant::BackFloor));
            }
        }
        if back_ceil {
            let origin_z = level.sectors[front].ceiling_height;
            let point_z = level.sectors[back].ceiling_height;
            let id = make_line_slope(
                slopes,
                Vec3::new(point_x, point_y, point_z),
                direction,
                (origin_z, point_z),
                (origin_x, origin_y),
                extent,
                flags,
            );
            level.sectors[back].ceiling_slope = Some(id);
            if spawn_thinker && flags & slope_flags::NO_DYNAMIC == 0 {
                sched.queue(DynSlopeTask::line(
                    id,
                    linenum,
                    extent,
                    LineQuadrant::BackCeiling,
                ));
            }
        }
    }
}

/// Fills in a line-anchored slope: the geometry is already axis-reduced to
/// a run (the extent) and two heights, so the angles derive directly with
/// no three-point detour.
fn make_line_slope(
    slopes: &mut SlopeRegistry,
    origin: Vec3,
    direction: Vec2,
    (start_z, end_z): (Fixed, Fixed),
    (mid_x, mid_y): (Fixed, Fixed),
    extent: Fixed,
    flags: u8,
) -> SlopeId {
    let id = slopes.add(flags);
    let slope = slopes.get_mut(id);
    slope.origin = origin;
    slope.direction = direction;
    slope.zdelta = (start_z - end_z).div(extent);
    slope.zangle = Angle::point_to_angle2(Fixed::ZERO, start_z, extent, end_z);
    slope.xydirection = Angle::point_to_angle2(mid_x, mid_y, origin.x, origin.y);
    slope.real_zangle = slope.zangle;
    slope.real_xydirection = slope.xydirection;
    slope.calculate_normal();
    id
}

fn spawn_via_vertexes(
    level: &mut LevelData,
    slopes: &mut SlopeRegistry,
    sched: &mut DynSlopeScheduler,
    linenum: usize,
    spawn_thinker: bool,
) -> Result<(), SlopeError> {
    let line = level.lines[linenum].clone();
    let flags = line_slope_flags(line.flags);

    let (sector_opt, is_ceiling, side_opt) = match line.special {
        704 => (line.front_sector, false, line.front_side),
        705 => (line.front_sector, true, line.front_side),
        714 => (line.back_sector, false, line.back_side),
        715 => (line.back_sector, true, line.back_side),
        _ => return Ok(()),
    };
    let (Some(target), Some(side_idx)) = (sector_opt, side_opt) else {
        warn!(
            "vertex slope special {} on line {} is missing its bound side",
            line.special, linenum
        );
        return Ok(());
    };
    let side = level.sides[side_idx].clone();

    let tags = if line.flags & line_flags::SLOPE_SPLIT_TAGS != 0 {
        [
            line.tag,
            side.texture_offset.to_int() as u16,
            side.row_offset.to_int() as u16,
        ]
    } else {
        [line.tag; 3]
    };

    let id = make_via_mapthings(level, slopes, sched, tags, flags, spawn_thinker)?;

    if is_ceiling {
        level.sectors[target].ceiling_slope = Some(id);
    } else {
        level.sectors[target].floor_slope = Some(id);
    }
    level.sectors[side.sector].has_slope = true;
    Ok(())
}

/// Builds a slope from the three map things tagged by `tags`. Each slot
/// claims the first unclaimed thing whose angle field matches; a slot that
/// resolves nothing is a fatal map-data error.
fn make_via_mapthings(
    level: &LevelData,
    slopes: &mut SlopeRegistry,
    sched: &mut DynSlopeScheduler,
    tags: [u16; 3],
    flags: u8,
    spawn_thinker: bool,
) -> Result<SlopeId, SlopeError> {
    let id = slopes.add(flags);

    let mut chosen: [Option<usize>; 3] = [None; 3];
    for (ti, thing) in level.things.iter().enumerate() {
        if thing.kind != SLOPE_VERTEX_THING_TYPE {
            continue;
        }
        if chosen[0].is_none() && thing.angle == tags[0] {
            chosen[0] = Some(ti);
        } else if chosen[1].is_none() && thing.angle == tags[1] {
            chosen[1] = Some(ti);
        } else if chosen[2].is_none() && thing.angle == tags[2] {
            chosen[2] = Some(ti);
        }
    }

    let mut vx = [Vec3::ZERO; 3];
    for i in 0..3 {
        let Some(ti) = chosen[i] else {
            return Err(SlopeError::MissingVertex {
                index: i,
                tag: tags[i],
            });
        };
        let thing = &level.things[ti];
        vx[i].x = Fixed::from_int(thing.x);
        vx[i].y = Fixed::from_int(thing.y);
        vx[i].z = if thing.extra_info {
            Fixed::from_int(thing.options as i32)
        } else {
            let base = level
                .sector_at_point(vx[i].x, vx[i].y)
                .map(|s| level.sectors[s].floor_height)
                .unwrap_or(Fixed::ZERO);
            base + Fixed::from_int((thing.options >> THING_Z_SHIFT) as i32)
        };
    }

    slopes
        .get_mut(id)
        .reconfigure_via_vertexes(vx[0], vx[1], vx[2]);

    if spawn_thinker && flags & slope_flags::NO_DYNAMIC == 0 {
        sched.queue(DynSlopeTask::vertex(id, tags, vx));
    }

    Ok(id)
}

/// Copies slopes from every sector tagged like the line into the line's
/// front sector. Only unset destination slots are written. The line's
/// special is cleared afterwards; it has done its job.
pub fn copy_sector_slope(level: &mut LevelData, linenum: usize) {
    let line = level.lines[linenum].clone();
    let Some(front) = line.front_sector else {
        return;
    };
    let special = line.special;

    for src in level.sectors_with_tag(line.tag) {
        if (special - 719) & 1 != 0 && level.sectors[front].floor_slope.is_none() {
            if let Some(s) = level.sectors[src].floor_slope {
                level.sectors[front].floor_slope = Some(s);
            }
        }
        if (special - 719) & 2 != 0 && level.sectors[front].ceiling_slope.is_none() {
            if let Some(s) = level.sectors[src].ceiling_slope {
                level.sectors[front].ceiling_slope = Some(s);
            }
        }
    }
    level.sectors[front].has_slope = true;

    // Sectors carrying a fake floor controlled by this sector inherit the
    // sloped rendering path too.
    for i in 0..level.sectors.len() {
        if level.sectors[i]
            .fake_floors
            .iter()
            .any(|ff| ff.control == front)
        {
            level.sectors[i].has_slope = true;
        }
    }

    level.lines[linenum].special = 0;
}

/// Height of a sector's floor at (x, y): the attached slope, or the flat
/// stored height.
pub fn sector_floor_z_at(
    level: &LevelData,
    slopes: &SlopeRegistry,
    sector: usize,
    x: Fixed,
    y: Fixed,
) -> Fixed {
    match level.sectors[sector].floor_slope {
        Some(id) => slopes.get(id).z_at(x, y),
        None => level.sectors[sector].floor_height,
    }
}

pub fn sector_ceiling_z_at(
    level: &LevelData,
    slopes: &SlopeRegistry,
    sector: usize,
    x: Fixed,
    y: Fixed,
) -> Fixed {
    match level.sectors[sector].ceiling_slope {
        Some(id) => slopes.get(id).z_at(x, y),
        None => level.sectors[sector].ceiling_height,
    }
}

/// Top plane of a fake floor: its control sector's ceiling.
pub fn fake_floor_top_z_at(
    level: &LevelData,
    slopes: &SlopeRegistry,
    control: usize,
    x: Fixed,
    y: Fixed,
) -> Fixed {
    sector_ceiling_z_at(level, slopes, control, x, y)
}

/// Bottom plane of a fake floor: its control sector's floor.
pub fn fake_floor_bottom_z_at(
    level: &LevelData,
    slopes: &SlopeRegistry,
    control: usize,
    x: Fixed,
    y: Fixed,
) -> Fixed {
    sector_floor_z_at(level, slopes, control, x, y)
}

pub fn light_z_at(slopes: &SlopeRegistry, light: &LightLevel, x: Fixed, y: Fixed) -> Fixed {
    match light.slope {
        Some(id) => slopes.get(id).z_at(x, y),
        None => light.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talus_map::{Line, MapThing, Sector, Side, Vertex};

    const TOL: i32 = 2048; // 1/32 map unit

    fn close(a: Fixed, b: Fixed) -> bool {
        (a.raw() - b.raw()).abs() <= TOL
    }

    fn fresh_slope(slopes: &mut SlopeRegistry, flags: u8) -> SlopeId {
        slopes.add(flags)
    }

    #[test]
    fn three_point_plane_reproduces_its_inputs() {
        let mut slopes = SlopeRegistry::new();
        let id = fresh_slope(&mut slopes, 0);
        let v1 = Vec3::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO);
        let v2 = Vec3::new(Fixed::from_int(64), Fixed::ZERO, Fixed::from_int(32));
        let v3 = Vec3::new(Fixed::ZERO, Fixed::from_int(64), Fixed::ZERO);
        slopes.get_mut(id).reconfigure_via_vertexes(v1, v2, v3);

        let slope = slopes.get(id);
        for v in [v1, v2, v3] {
            let z = slope.z_at(v.x, v.y);
            assert!(close(z, v.z), "z_at {:?} = {:?}", v, z);
        }
        // Any affine combination stays on the plane.
        let z = slope.z_at(Fixed::from_int(32), Fixed::from_int(32));
        assert!(close(z, Fixed::from_int(16)));
    }

    #[test]
    fn flat_vertex_slope_returns_origin_height_everywhere() {
        let mut slopes = SlopeRegistry::new();
        let id = fresh_slope(&mut slopes, 0);
        let h = Fixed::from_int(48);
        slopes.get_mut(id).reconfigure_via_vertexes(
            Vec3::new(Fixed::ZERO, Fixed::ZERO, h),
            Vec3::new(Fixed::from_int(64), Fixed::ZERO, h),
            Vec3::new(Fixed::ZERO, Fixed::from_int(64), h),
        );
        let slope = slopes.get(id);
        assert_eq!(slope.zdelta, Fixed::ZERO);
        assert_eq!(slope.zangle, Angle::ZERO);
        for (x, y) in [(-500, 0), (0, 0), (123, -77), (4000, 4000)] {
            assert_eq!(slope.z_at(Fixed::from_int(x), Fixed::from_int(y)), h);
        }
    }

    #[test]
    fn down_facing_normal_is_flipped_upward() {
        let mut slopes = SlopeRegistry::new();
        let id = fresh_slope(&mut slopes, 0);
        // Winding chosen so the raw cross product points down.
        slopes.get_mut(id).reconfigure_via_vertexes(
            Vec3::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO),
            Vec3::new(Fixed::ZERO, Fixed::from_int(64), Fixed::ZERO),
            Vec3::new(Fixed::from_int(64), Fixed::ZERO, Fixed::from_int(32)),
        );
        assert!(slopes.get(id).normal.z > Fixed::ZERO);
    }

    #[test]
    fn quantize_then_reverse_quantize_round_trips() {
        let mut slopes = SlopeRegistry::new();
        let id = fresh_slope(&mut slopes, 0);
        slopes.get_mut(id).reconfigure_via_vertexes(
            Vec3::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO),
            Vec3::new(Fixed::from_int(64), Fixed::ZERO, Fixed::from_int(24)),
            Vec3::new(Fixed::ZERO, Fixed::from_int(64), Fixed::ZERO),
        );
        let slope = slopes.get(id);

        let original = Vec3::new(Fixed::from_int(5), Fixed::from_int(3), Fixed::from_int(2));
        let mut momentum = original;
        slope.quantize_momentum(&mut momentum);
        assert_ne!(momentum, original);
        slope.reverse_quantize_momentum(&mut momentum);
        for (got, want) in [
            (momentum.x, original.x),
            (momentum.y, original.y),
            (momentum.z, original.z),
        ] {
            assert!(close(got, want), "{:?} vs {:?}", got, want);
        }
    }

    #[test]
    fn quantize_is_a_no_op_without_physics() {
        let mut slopes = SlopeRegistry::new();
        let id = fresh_slope(&mut slopes, slope_flags::NO_PHYSICS);
        slopes.get_mut(id).reconfigure_via_vertexes(
            Vec3::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO),
            Vec3::new(Fixed::from_int(64), Fixed::ZERO, Fixed::from_int(24)),
            Vec3::new(Fixed::ZERO, Fixed::from_int(64), Fixed::ZERO),
        );
        let slope = slopes.get(id);
        let original = Vec3::new(Fixed::from_int(5), Fixed::from_int(3), Fixed::from_int(2));
        let mut momentum = original;
        slope.quantize_momentum(&mut momentum);
        assert_eq!(momentum, original);
        slope.reverse_quantize_momentum(&mut momentum);
        assert_eq!(momentum, original);
    }

    /// Two 64-unit square sectors sharing a vertical edge at x = 64; the
    /// shared line is the slope control line.
    fn two_sector_level(special: i16, line_flag_bits: u16) -> LevelData {
        let u = Fixed::from_int;
        let vertices = vec![
            Vertex { x: u(0), y: u(0) },
            Vertex { x: u(64), y: u(0) },
            Vertex { x: u(64), y: u(64) },
            Vertex { x: u(0), y: u(64) },
            Vertex { x: u(128), y: u(0) },
            Vertex { x: u(128), y: u(64) },
        ];
        let mut lines = vec![
            // Front sector (0) boundary.
            Line { v1: 0, v2: 1, front_sector: Some(0), ..Line::default() },
            Line { v1: 3, v2: 0, front_sector: Some(0), ..Line::default() },
            Line { v1: 2, v2: 3, front_sector: Some(0), ..Line::default() },
            // Shared control line between sector 0 (front) and 1 (back);
            // wound so the front side faces the left square.
            Line {
                v1: 2,
                v2: 1,
                special,
                flags: line_flag_bits,
                front_sector: Some(0),
                back_sector: Some(1),
                ..Line::default()
            },
            // Back sector (1) boundary.
            Line { v1: 1, v2: 4, front_sector: Some(1), ..Line::default() },
            Line { v1: 4, v2: 5, front_sector: Some(1), ..Line::default() },
            Line { v1: 5, v2: 2, front_sector: Some(1), ..Line::default() },
        ];
        lines[3].front_side = Some(0);
        let sectors = vec![
            Sector {
                floor_height: u(0),
                ceiling_height: u(128),
                lines: vec![0, 1, 2, 3],
                ..Sector::default()
            },
            Sector {
                floor_height: u(32),
                ceiling_height: u(128),
                lines: vec![3, 4, 5, 6],
                ..Sector::default()
            },
        ];
        LevelData {
            vertices,
            sides: vec![Side {
                sector: 0,
                ..Side::default()
            }],
            lines,
            sectors,
            things: Vec::new(),
        }
    }

    #[test]
    fn front_floor_slope_interpolates_between_the_two_floors() {
        let mut level = two_sector_level(700, line_flags::SLOPE_DYNAMIC);
        let mut slopes = SlopeRegistry::new();
        let mut sched = DynSlopeScheduler::new();
        spawn_level_slopes(&mut level, &mut slopes, &mut sched, false)
            .expect("spawn should succeed");

        assert_eq!(slopes.len(), 1);
        assert!(level.sectors[0].floor_slope.is_some());
        assert!(level.sectors[0].has_slope);
        assert_eq!(sched.pending_len(), 1);

        // The front floor ramps up to the back sector's height at the
        // control line (x = 64) and meets its own height at the far edge.
        let near = sector_floor_z_at(&level, &slopes, 0, Fixed::from_int(64), Fixed::from_int(32));
        let far = sector_floor_z_at(&level, &slopes, 0, Fixed::from_int(0), Fixed::from_int(32));
        assert!(close(near, Fixed::from_int(32)), "near {:?}", near);
        assert!(close(far, Fixed::from_int(0)), "far {:?}", far);
    }

    #[test]
    fn one_sided_slope_line_is_left_flat() {
        let mut level = two_sector_level(700, 0);
        level.lines[3].back_sector = None;
        let mut slopes = SlopeRegistry::new();
        let mut sched = DynSlopeScheduler::new();
        spawn_level_slopes(&mut level, &mut slopes, &mut sched, false)
            .expect("spawn should succeed");
        assert!(slopes.is_empty());
        assert!(level.sectors[0].floor_slope.is_none());
    }

    #[test]
    fn vertex_slope_requires_all_three_reference_things() {
        let mut level = two_sector_level(704, 0);
        level.lines[3].tag = 5;
        level.things = vec![
            MapThing {
                x: 0,
                y: 0,
                angle: 5,
                kind: SLOPE_VERTEX_THING_TYPE,
                options: 0,
                extra_info: true,
            },
            MapThing {
                x: 64,
                y: 0,
                angle: 5,
                kind: SLOPE_VERTEX_THING_TYPE,
                options: 32,
                extra_info: true,
            },
        ];
        let mut slopes = SlopeRegistry::new();
        let mut sched = DynSlopeScheduler::new();
        let err = spawn_level_slopes(&mut level, &mut slopes, &mut sched, false)
            .expect_err("missing third vertex should be fatal");
        assert!(matches!(err, SlopeError::MissingVertex { index: 2, tag: 5 }));
    }

    #[test]
    fn vertex_slope_fits_the_tagged_things() {
        let mut level = two_sector_level(704, 0);
        level.lines[3].tag = 5;
        level.things = vec![
            MapThing {
                x: 0,
                y: 0,
                angle: 5,
                kind: SLOPE_VERTEX_THING_TYPE,
                options: 0,
                extra_info: true,
            },
            MapThing {
                x: 64,
                y: 0,
                angle: 5,
                kind: SLOPE_VERTEX_THING_TYPE,
                options: 32,
                extra_info: true,
            },
            MapThing {
                x: 0,
                y: 64,
                angle: 5,
                kind: SLOPE_VERTEX_THING_TYPE,
                options: 0,
                extra_info: true,
            },
        ];
        let mut slopes = SlopeRegistry::new();
        let mut sched = DynSlopeScheduler::new();
        spawn_level_slopes(&mut level, &mut slopes, &mut sched, false)
            .expect("spawn should succeed");
        let id = level.sectors[0].floor_slope.expect("slope attached");
        let z = slopes.get(id).z_at(Fixed::from_int(64), Fixed::ZERO);
        assert!(close(z, Fixed::from_int(32)));
    }

    #[test]
    fn copy_special_fills_only_unset_slots_and_clears_itself() {
        let mut level = two_sector_level(700, 0);
        // Give the back sector a copy line targeting the front's tag.
        level.sectors[0].tag = 9;
        level.lines[4].special = 720;
        level.lines[4].tag = 9;
        let mut slopes = SlopeRegistry::new();
        let mut sched = DynSlopeScheduler::new();
        spawn_level_slopes(&mut level, &mut slopes, &mut sched, false)
            .expect("spawn should succeed");

        let copied = level.sectors[1].floor_slope;
        assert_eq!(copied, level.sectors[0].floor_slope);
        assert_eq!(level.lines[4].special, 0);
        assert!(level.sectors[1].has_slope);
    }

    #[test]
    fn by_id_finds_each_spawned_slope() {
        let mut level = two_sector_level(702, 0);
        let mut slopes = SlopeRegistry::new();
        let mut sched = DynSlopeScheduler::new();
        spawn_level_slopes(&mut level, &mut slopes, &mut sched, false)
            .expect("spawn should succeed");
        assert_eq!(slopes.len(), 2);
        assert!(slopes.by_id(1).is_some());
        assert!(slopes.by_id(2).is_some());
        assert!(slopes.by_id(3).is_none());
        assert_eq!(slopes.by_id(2).map(|s| s.id.raw()), Some(2));
    }
}
