use talus_map::Fixed;

use crate::actor::{Actor, MF_NOGRAVITY, MFE_VERTICALFLIP, PF_SPINNING};

/// The fixed catalogue of hardcoded per-object actions. Scripts override an
/// entry by registering a function under its canonical uppercase name; the
/// enum is the identity gameplay code dispatches by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionId {
    Explode,
    Pain,
    Fall,
    Stop,
    Thrust,
    ZThrust,
    Bounce,
    Jump,
    Spin,
    SetFlags,
    UnsetFlags,
    GravityFlip,
    Friction,
}

pub const NUM_ACTIONS: usize = 13;

impl ActionId {
    pub const ALL: [ActionId; NUM_ACTIONS] = [
        ActionId::Explode,
        ActionId::Pain,
        ActionId::Fall,
        ActionId::Stop,
        ActionId::Thrust,
        ActionId::ZThrust,
        ActionId::Bounce,
        ActionId::Jump,
        ActionId::Spin,
        ActionId::SetFlags,
        ActionId::UnsetFlags,
        ActionId::GravityFlip,
        ActionId::Friction,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActionId::Explode => "A_EXPLODE",
            ActionId::Pain => "A_PAIN",
            ActionId::Fall => "A_FALL",
            ActionId::Stop => "A_STOP",
            ActionId::Thrust => "A_THRUST",
            ActionId::ZThrust => "A_ZTHRUST",
            ActionId::Bounce => "A_BOUNCE",
            ActionId::Jump => "A_JUMP",
            ActionId::Spin => "A_SPIN",
            ActionId::SetFlags => "A_SETFLAGS",
            ActionId::UnsetFlags => "A_UNSETFLAGS",
            ActionId::GravityFlip => "A_GRAVITYFLIP",
            ActionId::Friction => "A_FRICTION",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<ActionId> {
        ActionId::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(name))
    }
}

/// Runs the hardcoded body of an action. Dispatch offers every invocation
/// to the scripting layer first; this only executes when no override claims
/// it (or when a scripted body re-invokes its own name to get the stock
/// behavior).
pub fn run_hardcoded(id: ActionId, actor: &mut Actor, var1: i32, _var2: i32) {
    match id {
        ActionId::Explode => {
            actor.health = 0;
        }
        ActionId::Pain => {
            actor.momx = Fixed::ZERO;
            actor.momy = Fixed::ZERO;
        }
        ActionId::Fall => {
            actor.flags &= !MF_NOGRAVITY;
        }
        ActionId::Stop => {
            actor.momx = Fixed::ZERO;
            actor.momy = Fixed::ZERO;
            actor.momz = Fixed::ZERO;
        }
        ActionId::Thrust => {
            let angle = actor.angle;
            actor.thrust(angle, Fixed::from_int(var1));
        }
        ActionId::ZThrust => {
            actor.momz += Fixed::from_int(var1) * actor.flip();
        }
        ActionId::Bounce => {
            actor.momz = -actor.momz;
        }
        ActionId::Jump => {
            actor.momz = Fixed::from_int(var1) * actor.flip();
        }
        ActionId::Spin => {
            if let Some(player) = actor.player.as_mut() {
                player.pflags |= PF_SPINNING;
            }
        }
        ActionId::SetFlags => {
            actor.flags |= var1 as u32;
        }
        ActionId::UnsetFlags => {
            actor.flags &= !(var1 as u32);
        }
        ActionId::GravityFlip => {
            actor.eflags ^= MFE_VERTICALFLIP;
        }
        ActionId::Friction => {
            actor.friction = Fixed::from_raw(var1);
        }
    }
}
