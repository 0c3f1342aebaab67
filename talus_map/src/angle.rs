use std::f64::consts::TAU;
use std::ops::{Add, Sub};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::fixed::Fixed;

/// Number of entries in the fine-angle trig table.
pub const FINE_ANGLES: usize = 8192;
pub const FINE_MASK: usize = FINE_ANGLES - 1;
/// Shift taking a full-circle binary angle down to a fine-table index.
pub const ANGLE_TO_FINE_SHIFT: u32 = 19;

static FINE_SINE: Lazy<Vec<Fixed>> = Lazy::new(|| {
    (0..FINE_ANGLES)
        .map(|i| {
            let rad = i as f64 * TAU / FINE_ANGLES as f64;
            Fixed::from_raw((rad.sin() * Fixed::UNIT.raw() as f64).round() as i32)
        })
        .collect()
});

pub fn fine_sine(index: usize) -> Fixed {
    FINE_SINE[index & FINE_MASK]
}

pub fn fine_cosine(index: usize) -> Fixed {
    FINE_SINE[(index + FINE_ANGLES / 4) & FINE_MASK]
}

/// Full-circle binary angle: the whole u32 range maps to one turn, so
/// wrapping arithmetic is angular arithmetic.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Angle(u32);

impl Angle {
    pub const ZERO: Angle = Angle(0);
    pub const QUARTER: Angle = Angle(0x4000_0000);
    pub const HALF: Angle = Angle(0x8000_0000);

    pub const fn from_raw(raw: u32) -> Angle {
        Angle(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn invert(self) -> Angle {
        Angle(self.0.wrapping_neg())
    }

    pub const fn fine(self) -> usize {
        (self.0 >> ANGLE_TO_FINE_SHIFT) as usize
    }

    pub fn sine(self) -> Fixed {
        fine_sine(self.fine())
    }

    pub fn cosine(self) -> Fixed {
        fine_cosine(self.fine())
    }

    /// Angle of the ray from (x1, y1) toward (x2, y2); zero for a degenerate
    /// ray.
    pub fn point_to_angle2(x1: Fixed, y1: Fixed, x2: Fixed, y2: Fixed) -> Angle {
        let dx = x2.raw() as i64 - x1.raw() as i64;
        let dy = y2.raw() as i64 - y1.raw() as i64;
        if dx == 0 && dy == 0 {
            return Angle::ZERO;
        }
        let turns = ((dy as f64).atan2(dx as f64) / TAU).rem_euclid(1.0);
        Angle((turns * 4_294_967_296.0) as u64 as u32)
    }
}

impl Add for Angle {
    type Output = Angle;

    fn add(self, rhs: Angle) -> Angle {
        Angle(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Angle {
    type Output = Angle;

    fn sub(self, rhs: Angle) -> Angle {
        Angle(self.0.wrapping_sub(rhs.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinal_directions_land_on_quadrant_boundaries() {
        let east = Angle::point_to_angle2(Fixed::ZERO, Fixed::ZERO, Fixed::UNIT, Fixed::ZERO);
        let north = Angle::point_to_angle2(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO, Fixed::UNIT);
        let west = Angle::point_to_angle2(Fixed::ZERO, Fixed::ZERO, -Fixed::UNIT, Fixed::ZERO);
        assert_eq!(east, Angle::ZERO);
        assert_eq!(north, Angle::QUARTER);
        assert_eq!(west, Angle::HALF);
    }

    #[test]
    fn invert_is_an_involution() {
        let a = Angle::from_raw(0x1234_5678);
        assert_eq!(a.invert().invert(), a);
        assert_eq!(Angle::ZERO.invert(), Angle::ZERO);
    }

    #[test]
    fn sine_and_cosine_hit_the_table_extremes() {
        assert_eq!(Angle::ZERO.sine(), Fixed::ZERO);
        assert_eq!(Angle::ZERO.cosine(), Fixed::UNIT);
        assert_eq!(Angle::QUARTER.sine(), Fixed::UNIT);
        assert_eq!(Angle::HALF.cosine(), -Fixed::UNIT);
    }

    #[test]
    fn forty_five_degrees_splits_the_components() {
        let a = Angle::point_to_angle2(Fixed::ZERO, Fixed::ZERO, Fixed::UNIT, Fixed::UNIT);
        let s = a.sine().raw();
        let c = a.cosine().raw();
        // sin == cos == sqrt(2)/2 within table rounding
        assert!((s - c).abs() <= 32, "sine {s} vs cosine {c}");
        assert!((s - 46341).abs() <= 64);
    }
}
