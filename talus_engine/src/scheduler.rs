use talus_map::{Angle, Fixed, LevelData, SlopeId, Vec3, SLOPE_HEIGHT_SPECIAL};

use crate::slope::SlopeRegistry;

/// Which adjoining-sector height pair drives a line-anchored task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineQuadrant {
    FrontFloor,
    FrontCeiling,
    BackFloor,
    BackCeiling,
}

#[derive(Clone, Debug)]
pub enum TaskKind {
    /// Driven by a control line: the precomputed extent turns the height
    /// difference between the two adjoining sectors into a zdelta.
    Line {
        source: usize,
        extent: Fixed,
        quadrant: LineQuadrant,
    },
    /// Driven by three tagged reference points, re-resolved every tick.
    Vertex { tags: [u16; 3], points: [Vec3; 3] },
}

/// One per-tick recompute unit. A task never outlives its slope; both are
/// dropped together when the map unloads.
#[derive(Clone, Debug)]
pub struct DynSlopeTask {
    pub slope: SlopeId,
    pub kind: TaskKind,
}

impl DynSlopeTask {
    pub fn line(slope: SlopeId, source: usize, extent: Fixed, quadrant: LineQuadrant) -> Self {
        DynSlopeTask {
            slope,
            kind: TaskKind::Line {
                source,
                extent,
                quadrant,
            },
        }
    }

    pub fn vertex(slope: SlopeId, tags: [u16; 3], points: [Vec3; 3]) -> Self {
        DynSlopeTask {
            slope,
            kind: TaskKind::Vertex { tags, points },
        }
    }
}

/// Accumulate-then-commit task set: spawn code queues into `pending`, and a
/// single [`DynSlopeScheduler::commit`] before the first tick splices the
/// queue into the live set in original queuing order. Tasks are never
/// removed individually.
#[derive(Debug, Default)]
pub struct DynSlopeScheduler {
    pending: Vec<DynSlopeTask>,
    active: Vec<DynSlopeTask>,
}

impl DynSlopeScheduler {
    pub fn new() -> DynSlopeScheduler {
        DynSlopeScheduler::default()
    }

    /// Drops all tasks; run at map unload.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.active.clear();
    }

    pub fn queue(&mut self, task: DynSlopeTask) {
        self.pending.push(task);
    }

    /// Splices every queued task into the live per-tick set, preserving
    /// queue order.
    pub fn commit(&mut self) {
        self.active.append(&mut self.pending);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Recomputes every live dynamic slope. Runs in a dedicated early phase
    /// of the tick, before any gameplay code reads slope heights.
    pub fn run_tick(&mut self, level: &LevelData, slopes: &mut SlopeRegistry) {
        for task in &mut self.active {
            match &mut task.kind {
                TaskKind::Line {
                    source,
                    extent,
                    quadrant,
                } => recompute_line(slopes, task.slope, level, *source, *extent, *quadrant),
                TaskKind::Vertex { tags, points } => {
                    recompute_vertex(slopes, task.slope, level, *tags, points)
                }
            }
        }
    }
}

/// Refits a line-anchored slope from its current sector heights. Writes
/// nothing when the derived values are unchanged, so slope-dependent caches
/// are not re-triggered on ticks where nothing moved.
fn recompute_line(
    slopes: &mut SlopeRegistry,
    id: SlopeId,
    level: &LevelData,
    source: usize,
    extent: Fixed,
    quadrant: LineQuadrant,
) {
    let line = &level.lines[source];
    let (Some(front), Some(back)) = (line.front_sector, line.back_sector) else {
        return;
    };
    let front = &level.sectors[front];
    let back = &level.sectors[back];

    let (height_delta, origin_z) = match quadrant {
        LineQuadrant::FrontFloor => (back.floor_height - front.floor_height, front.floor_height),
        LineQuadrant::FrontCeiling => (
            back.ceiling_height - front.ceiling_height,
            front.ceiling_height,
        ),
        LineQuadrant::BackFloor => (front.floor_height - back.floor_height, back.floor_height),
        LineQuadrant::BackCeiling => (
            front.ceiling_height - back.ceiling_height,
            back.ceiling_height,
        ),
    };

    let slope = slopes.get_mut(id);
    let zdelta = height_delta.div(extent);
    if slope.zdelta != zdelta || slope.origin.z != origin_z {
        slope.origin.z = origin_z;
        slope.zdelta = zdelta;
        slope.zangle = Angle::point_to_angle2(Fixed::ZERO, Fixed::ZERO, extent, -height_delta);
        slope.real_zangle = slope.zangle;
        slope.calculate_normal();
        slope.generation = slope.generation.wrapping_add(1);
    }
}

/// Refits a vertex-anchored slope. The three reference heights resolve
/// through the height-control special each tick and the plane is rebuilt
/// unconditionally; three-point slopes always pay full reconstruction.
fn recompute_vertex(
    slopes: &mut SlopeRegistry,
    id: SlopeId,
    level: &LevelData,
    tags: [u16; 3],
    points: &mut [Vec3; 3],
) {
    for (i, point) in points.iter_mut().enumerate() {
        point.z = level
            .find_special_line_from_tag(SLOPE_HEIGHT_SPECIAL, tags[i])
            .and_then(|l| level.lines[l].front_sector)
            .map(|s| level.sectors[s].floor_height)
            .unwrap_or(Fixed::ZERO);
    }
    let slope = slopes.get_mut(id);
    slope.reconfigure_via_vertexes(points[0], points[1], points[2]);
    slope.generation = slope.generation.wrapping_add(1);
}
