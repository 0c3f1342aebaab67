use talus_map::{Angle, Fixed, SlopeId, Vec3};

use crate::actor::{Actor, MF_NOCLIPHEIGHT, MF_NOGRAVITY, MFE_VERTICALFLIP, ORIG_FRICTION};
use crate::slope::SlopeRegistry;

fn flip_sign(actor: &Actor, value: Fixed) -> i64 {
    actor.flip() as i64 * value.raw() as i64
}

/// Ejects an object from the slope it stands on, rotating its momentum back
/// into the slope's plane so it leaves along the surface.
pub fn slope_launch(actor: &mut Actor, slopes: &SlopeRegistry) {
    if let Some(id) = actor.standing_slope {
        let slope = slopes.get(id);
        if slope.has_physics() {
            let mut momentum = Vec3::new(actor.momx, actor.momy, actor.momz);
            slope.quantize_momentum(&mut momentum);
            actor.momx = momentum.x;
            actor.momy = momentum.y;
            actor.momz = momentum.z;
        }
    }
    actor.standing_slope = None;
}

/// Handles an object touching down on a slope. The vertical momentum is
/// doubled before the reverse rotation to compensate for the asymmetric
/// gravity integration, and the landing only sticks when the slope-relative
/// momentum still points into the surface; otherwise the object is moving
/// away and must not attach.
pub fn handle_slope_landing(actor: &mut Actor, slopes: &SlopeRegistry, id: SlopeId) {
    let slope = slopes.get(id);

    if !slope.has_physics() {
        if flip_sign(actor, actor.momz) < 0 {
            actor.momz = Fixed::from_raw(-actor.flip());
            actor.standing_slope = Some(id);
        }
        return;
    }

    let mut momentum = Vec3::new(actor.momx, actor.momy, actor.momz * 2);
    slope.reverse_quantize_momentum(&mut momentum);

    if flip_sign(actor, momentum.z) < 0 {
        actor.momx = momentum.x;
        actor.momy = momentum.y;
        actor.momz = Fixed::from_raw(-actor.flip());
        actor.standing_slope = Some(id);
    }
}

/// Per-tick downhill pull for objects standing on a slope. Skipped for
/// physics-disabled slopes, for objects the ground cannot touch, and below
/// steepness thresholds that would only make standing players jitter.
pub fn buttered_slope(actor: &mut Actor, slopes: &SlopeRegistry) {
    let Some(id) = actor.standing_slope else {
        return;
    };
    let slope = slopes.get(id);

    if !slope.has_physics() {
        return;
    }
    if actor.flags & (MF_NOCLIPHEIGHT | MF_NOGRAVITY) != 0 {
        return;
    }

    if let Some(player) = &actor.player {
        if slope.zdelta.abs() < Fixed::UNIT / 4 && !actor.is_spinning() {
            return;
        }
        if slope.zdelta.abs() < Fixed::UNIT / 2
            && player.rmomx == Fixed::ZERO
            && player.rmomy == Fixed::ZERO
        {
            return;
        }
    }

    let downhill = if actor.eflags & MFE_VERTICALFLIP != 0 { 1 } else { -1 };
    let mut thrust = slope.zangle.sine() * 15 / 16 * downhill;

    if actor.is_spinning() {
        // Rolling objects speed up downhill and fight uphill travel.
        let mut mult = Fixed::ZERO;
        if actor.momx != Fixed::ZERO || actor.momy != Fixed::ZERO {
            let mut angle =
                Angle::point_to_angle2(Fixed::ZERO, Fixed::ZERO, actor.momx, actor.momy)
                    - slope.xydirection;
            if flip_sign(actor, slope.zdelta) < 0 {
                angle = angle + Angle::HALF;
            }
            mult = angle.cosine();
        }
        thrust = thrust.mul(Fixed::UNIT * 2 / 3 + mult / 8);
    }

    if actor.momx != Fixed::ZERO || actor.momy != Fixed::ZERO {
        // Harder to zigzag up steep slopes, faster to roll down them.
        let speed = Fixed::approx_dist(actor.momx, actor.momy);
        thrust = thrust.mul(Fixed::UNIT + speed / 16);
    }

    thrust = thrust.mul(actor.gravity.abs());
    thrust = thrust.mul(actor.friction.div(ORIG_FRICTION));

    actor.thrust(slope.xydirection, thrust);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Player, PF_SPINNING};
    use crate::slope::slope_flags;

    const TOL: i32 = 2048;

    fn close(a: Fixed, b: Fixed) -> bool {
        (a.raw() - b.raw()).abs() <= TOL
    }

    /// Registry with a single slope rising 24 units over a 64 unit run.
    fn sloped_registry(flags: u8) -> (SlopeRegistry, SlopeId) {
        let mut slopes = SlopeRegistry::new();
        let id = slopes.add(flags);
        slopes.get_mut(id).reconfigure_via_vertexes(
            Vec3::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO),
            Vec3::new(Fixed::from_int(64), Fixed::ZERO, Fixed::from_int(24)),
            Vec3::new(Fixed::ZERO, Fixed::from_int(64), Fixed::ZERO),
        );
        (slopes, id)
    }

    #[test]
    fn falling_objects_attach_and_keep_their_heading() {
        let (slopes, id) = sloped_registry(0);
        let mut actor = Actor::new();
        actor.momx = Fixed::from_int(4);
        actor.momz = Fixed::from_int(-6);
        handle_slope_landing(&mut actor, &slopes, id);
        assert_eq!(actor.standing_slope, Some(id));
        // Vertical momentum collapses to the tiny into-ground nudge.
        assert_eq!(actor.momz, Fixed::from_raw(-1));
    }

    #[test]
    fn rising_objects_do_not_attach() {
        let (slopes, id) = sloped_registry(0);
        let mut actor = Actor::new();
        actor.momz = Fixed::from_int(10);
        let before = (actor.momx, actor.momy, actor.momz);
        handle_slope_landing(&mut actor, &slopes, id);
        assert_eq!(actor.standing_slope, None);
        assert_eq!((actor.momx, actor.momy, actor.momz), before);
    }

    #[test]
    fn launch_rotates_into_the_plane_and_detaches() {
        let (slopes, id) = sloped_registry(0);
        let mut actor = Actor::new();
        actor.standing_slope = Some(id);
        actor.momx = Fixed::from_int(8);
        slope_launch(&mut actor, &slopes);
        assert_eq!(actor.standing_slope, None);
        // Running up the +x incline turns flat momentum into upward lift.
        assert!(actor.momz > Fixed::ZERO, "momz {:?}", actor.momz);
        assert!(actor.momx < Fixed::from_int(8));
    }

    #[test]
    fn physics_disabled_slopes_leave_momentum_alone() {
        let (slopes, id) = sloped_registry(slope_flags::NO_PHYSICS);
        let mut actor = Actor::new();
        actor.standing_slope = Some(id);
        actor.momx = Fixed::from_int(8);
        slope_launch(&mut actor, &slopes);
        assert_eq!(actor.momx, Fixed::from_int(8));
        assert_eq!(actor.momz, Fixed::ZERO);
        assert_eq!(actor.standing_slope, None);

        let mut actor = Actor::new();
        actor.momz = Fixed::from_int(-6);
        handle_slope_landing(&mut actor, &slopes, id);
        // Still attaches, but keeps the flat-ground momentum.
        assert_eq!(actor.standing_slope, Some(id));
        assert_eq!(actor.momx, Fixed::ZERO);
    }

    #[test]
    fn butter_pushes_stationary_non_players_downhill() {
        let (slopes, id) = sloped_registry(0);
        let mut actor = Actor::new();
        actor.standing_slope = Some(id);
        buttered_slope(&mut actor, &slopes);
        // The slope rises toward +x, so the thrust points toward -x.
        assert!(actor.momx < Fixed::ZERO, "momx {:?}", actor.momx);
        assert!(close(actor.momy, Fixed::ZERO));
    }

    #[test]
    fn shallow_slopes_do_not_shove_standing_players() {
        let mut slopes = SlopeRegistry::new();
        let id = slopes.add(0);
        // Rise of 8 over 64: zdelta 0.125, below both cutoffs.
        slopes.get_mut(id).reconfigure_via_vertexes(
            Vec3::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO),
            Vec3::new(Fixed::from_int(64), Fixed::ZERO, Fixed::from_int(8)),
            Vec3::new(Fixed::ZERO, Fixed::from_int(64), Fixed::ZERO),
        );
        let mut actor = Actor::new();
        actor.player = Some(Player::default());
        actor.standing_slope = Some(id);
        buttered_slope(&mut actor, &slopes);
        assert_eq!(actor.momx, Fixed::ZERO);

        // Spinning lifts the steepness cutoff, but a player at rest on a
        // shallow slope still stays put.
        actor.player.as_mut().expect("player present").pflags |= PF_SPINNING;
        buttered_slope(&mut actor, &slopes);
        assert_eq!(actor.momx, Fixed::ZERO);

        // Once the player is actually moving relative to the ground, the
        // spin thrust kicks in.
        let player = actor.player.as_mut().expect("player present");
        player.rmomx = Fixed::UNIT;
        buttered_slope(&mut actor, &slopes);
        assert_ne!(actor.momx, Fixed::ZERO);
    }

    #[test]
    fn flight_unaffected_objects_are_skipped() {
        let (slopes, id) = sloped_registry(0);
        let mut actor = Actor::new();
        actor.flags |= MF_NOGRAVITY;
        actor.standing_slope = Some(id);
        buttered_slope(&mut actor, &slopes);
        assert_eq!(actor.momx, Fixed::ZERO);
    }
}
