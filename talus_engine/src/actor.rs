use std::cell::RefCell;
use std::rc::Rc;

use talus_map::{Angle, Fixed, SlopeId};

/// Object flag bits (the subset the slope core consumes).
pub const MF_NOCLIPHEIGHT: u32 = 0x0001;
pub const MF_NOGRAVITY: u32 = 0x0002;

/// Extra flag bits.
pub const MFE_VERTICALFLIP: u32 = 0x0001;

/// Player flag bits.
pub const PF_SPINNING: u32 = 0x0001;

/// Standard ground friction; per-tick thrust scales against this so custom
/// friction surfaces keep the stock feel on normal slopes.
pub const ORIG_FRICTION: Fixed = Fixed::from_raw(0xE800);

/// Default downward pull per tick.
pub const DEFAULT_GRAVITY: Fixed = Fixed::from_raw(1 << 15);

#[derive(Clone, Debug, Default)]
pub struct Player {
    pub pflags: u32,
    /// Momentum relative to the conveyor/platform the player rides.
    pub rmomx: Fixed,
    pub rmomy: Fixed,
}

/// A simulated game object. Only the fields the slope and action layers
/// touch live here; the wider simulation owns everything else.
#[derive(Clone, Debug)]
pub struct Actor {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub momx: Fixed,
    pub momy: Fixed,
    pub momz: Fixed,
    pub angle: Angle,
    pub flags: u32,
    pub eflags: u32,
    pub health: i32,
    pub state: usize,
    pub friction: Fixed,
    pub gravity: Fixed,
    pub standing_slope: Option<SlopeId>,
    pub player: Option<Player>,
}

impl Default for Actor {
    fn default() -> Actor {
        Actor {
            x: Fixed::ZERO,
            y: Fixed::ZERO,
            z: Fixed::ZERO,
            momx: Fixed::ZERO,
            momy: Fixed::ZERO,
            momz: Fixed::ZERO,
            angle: Angle::ZERO,
            flags: 0,
            eflags: 0,
            health: 1,
            state: 0,
            friction: ORIG_FRICTION,
            gravity: DEFAULT_GRAVITY,
            standing_slope: None,
            player: None,
        }
    }
}

impl Actor {
    pub fn new() -> Actor {
        Actor::default()
    }

    /// +1 for normal gravity, -1 when vertically flipped.
    pub fn flip(&self) -> i32 {
        if self.eflags & MFE_VERTICALFLIP != 0 {
            -1
        } else {
            1
        }
    }

    pub fn is_spinning(&self) -> bool {
        self.player
            .as_ref()
            .map_or(false, |p| p.pflags & PF_SPINNING != 0)
    }

    /// Accelerates along a map angle.
    pub fn thrust(&mut self, angle: Angle, amount: Fixed) {
        self.momx += amount.mul(angle.cosine());
        self.momy += amount.mul(angle.sine());
    }
}

/// Actors are shared single-threaded between the simulation and the Lua
/// host.
pub type ActorRef = Rc<RefCell<Actor>>;
