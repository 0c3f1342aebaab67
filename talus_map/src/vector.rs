use serde::{Deserialize, Serialize};

use crate::fixed::Fixed;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: Fixed,
    pub y: Fixed,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    pub const fn new(x: Fixed, y: Fixed) -> Vec2 {
        Vec2 { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
        z: Fixed::ZERO,
    };

    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Vec3 {
        Vec3 { x, y, z }
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y.mul(other.z) - self.z.mul(other.y),
            y: self.z.mul(other.x) - self.x.mul(other.z),
            z: self.x.mul(other.y) - self.y.mul(other.x),
        }
    }

    pub fn div_scalar(self, m: Fixed) -> Vec3 {
        Vec3 {
            x: self.x.div(m),
            y: self.y.div(m),
            z: self.z.div(m),
        }
    }

    pub fn max_component_abs(self) -> Fixed {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }

    /// Rodrigues rotation about a unit axis, with the rotation's cosine and
    /// sine supplied by the caller (fine-table values in practice).
    pub fn rotated_about(self, axis: Vec3, cosv: Fixed, sinv: Fixed) -> Vec3 {
        let t = Fixed::UNIT - cosv;
        let (ux, uy, uz) = (axis.x, axis.y, axis.z);

        let m00 = cosv + t.mul(ux).mul(ux);
        let m01 = t.mul(ux).mul(uy) - sinv.mul(uz);
        let m02 = t.mul(ux).mul(uz) + sinv.mul(uy);
        let m10 = t.mul(ux).mul(uy) + sinv.mul(uz);
        let m11 = cosv + t.mul(uy).mul(uy);
        let m12 = t.mul(uy).mul(uz) - sinv.mul(ux);
        let m20 = t.mul(ux).mul(uz) - sinv.mul(uy);
        let m21 = t.mul(uy).mul(uz) + sinv.mul(ux);
        let m22 = cosv + t.mul(uz).mul(uz);

        Vec3 {
            x: m00.mul(self.x) + m01.mul(self.y) + m02.mul(self.z),
            y: m10.mul(self.x) + m11.mul(self.y) + m12.mul(self.z),
            z: m20.mul(self.x) + m21.mul(self.y) + m22.mul(self.z),
        }
    }
}
