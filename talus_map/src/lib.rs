pub mod angle;
pub mod fixed;
pub mod level;
pub mod vector;

pub use angle::{fine_cosine, fine_sine, Angle, ANGLE_TO_FINE_SHIFT, FINE_ANGLES};
pub use fixed::{point_to_dist2, Fixed, FRACBITS};
pub use level::{
    line_flags, FakeFloor, LevelData, LightLevel, Line, MapThing, Sector, Side, SlopeId, Vertex,
    SLOPE_HEIGHT_SPECIAL, SLOPE_VERTEX_THING_TYPE, THING_Z_SHIFT,
};
pub use vector::{Vec2, Vec3};
