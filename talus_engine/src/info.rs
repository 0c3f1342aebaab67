use thiserror::Error;

use talus_map::Fixed;

use crate::actions::ActionId;
use crate::phase::PhaseContext;

/// Ordered field catalogue for animation states. Positions double as the
/// 1-based positional codes accepted in bulk-assignment tables.
pub const STATE_FIELDS: &[&str] = &[
    "sprite",
    "frame",
    "tics",
    "action",
    "var1",
    "var2",
    "nextstate",
];

/// Ordered field catalogue for object templates.
pub const TEMPLATE_FIELDS: &[&str] = &[
    "doomednum",
    "spawnstate",
    "spawnhealth",
    "seestate",
    "seesound",
    "reactiontime",
    "attacksound",
    "painstate",
    "painchance",
    "painsound",
    "meleestate",
    "missilestate",
    "deathstate",
    "xdeathstate",
    "deathsound",
    "speed",
    "radius",
    "height",
    "dispoffset",
    "mass",
    "damage",
    "activesound",
    "flags",
    "raisestate",
];

/// Ordered field catalogue for sound definitions.
pub const SOUND_FIELDS: &[&str] = &["name", "singular", "priority", "flags", "skinsound"];

/// Resolves a 1-based positional code against a field catalogue.
pub fn field_by_code(catalogue: &[&'static str], code: usize) -> Option<&'static str> {
    if code == 0 {
        return None;
    }
    catalogue.get(code - 1).copied()
}

#[derive(Debug, Error)]
pub enum InfoError {
    #[error("{kind}[] index {index} out of range (0 - {max})")]
    IndexOutOfRange {
        kind: &'static str,
        index: i64,
        max: i64,
    },
    #[error("{field} number {value} is invalid")]
    InvalidValue { field: &'static str, value: i64 },
    #[error("{kind} field '{field}' is read-only")]
    ReadOnly { kind: &'static str, field: String },
    #[error("{kind} has no field named '{field}'")]
    UnknownField { kind: &'static str, field: String },
    #[error("Do not alter {kind} in {phase} code!")]
    ForbiddenPhase {
        kind: &'static str,
        phase: &'static str,
    },
}

/// Refuses mutation while a forbidden phase is active.
pub fn ensure_mutable(phase: &PhaseContext, kind: &'static str) -> Result<(), InfoError> {
    match phase.forbidden() {
        Some(p) => Err(InfoError::ForbiddenPhase {
            kind,
            phase: p.description(),
        }),
        None => Ok(()),
    }
}

/// What a state's action slot points at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionSlot {
    #[default]
    None,
    Hardcoded(ActionId),
    /// An anonymous scripted function bound to this state's identity; the
    /// callable itself lives in the scripting layer's registry.
    Scripted,
}

/// One animation state. Bulk assignment resets to this default first, so
/// unset fields come out documented rather than stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateDef {
    pub sprite: i32,
    pub frame: u32,
    pub tics: i32,
    pub action: ActionSlot,
    pub var1: i32,
    pub var2: i32,
    pub next_state: usize,
}

impl Default for StateDef {
    fn default() -> StateDef {
        StateDef {
            sprite: 0,
            frame: 0,
            tics: -1,
            action: ActionSlot::None,
            var1: 0,
            var2: 0,
            next_state: 0,
        }
    }
}

/// One object template. The defaults carry the "no editor value" sentinel
/// and a nonzero spawn health so a freshly assigned template doesn't spawn
/// dead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectTemplate {
    pub doomednum: i32,
    pub spawnstate: usize,
    pub spawnhealth: i32,
    pub seestate: usize,
    pub seesound: usize,
    pub reactiontime: i32,
    pub attacksound: usize,
    pub painstate: usize,
    pub painchance: i32,
    pub painsound: usize,
    pub meleestate: usize,
    pub missilestate: usize,
    pub deathstate: usize,
    pub xdeathstate: usize,
    pub deathsound: usize,
    pub speed: i32,
    pub radius: Fixed,
    pub height: Fixed,
    pub dispoffset: i32,
    pub mass: i32,
    pub damage: i32,
    pub activesound: usize,
    pub flags: u32,
    pub raisestate: usize,
}

impl Default for ObjectTemplate {
    fn default() -> ObjectTemplate {
        ObjectTemplate {
            doomednum: -1,
            spawnstate: 0,
            spawnhealth: 1,
            seestate: 0,
            seesound: 0,
            reactiontime: 0,
            attacksound: 0,
            painstate: 0,
            painchance: 0,
            painsound: 0,
            meleestate: 0,
            missilestate: 0,
            deathstate: 0,
            xdeathstate: 0,
            deathsound: 0,
            speed: 0,
            radius: Fixed::ZERO,
            height: Fixed::ZERO,
            dispoffset: 0,
            mass: 0,
            damage: 0,
            activesound: 0,
            flags: 0,
            raisestate: 0,
        }
    }
}

/// One sound definition. Name and skin-sound link identify the entry and
/// stay read-only through the reflective layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SoundDef {
    pub name: String,
    pub singular: bool,
    pub priority: i32,
    pub flags: i32,
    pub skin_sound: i32,
}

/// A value read out of a record field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

/// The three reflectable record arrays plus the sprite-name list.
#[derive(Debug, Default)]
pub struct InfoTables {
    pub sprite_names: Vec<String>,
    pub states: Vec<StateDef>,
    pub templates: Vec<ObjectTemplate>,
    pub sounds: Vec<SoundDef>,
}

impl InfoTables {
    pub fn new() -> InfoTables {
        InfoTables::default()
    }

    /// A small built-in table set, enough for the demo binary and tests.
    pub fn with_baseline() -> InfoTables {
        let sprite_names = ["NULL", "PLAY", "RING", "SPIK"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let sounds = ["none", "thok", "spin", "pop"]
            .iter()
            .enumerate()
            .map(|(i, name)| SoundDef {
                name: name.to_string(),
                singular: false,
                priority: 64 * i as i32,
                flags: 0,
                skin_sound: -1,
            })
            .collect();
        let mut states = vec![StateDef::default(); 8];
        states[1] = StateDef {
            sprite: 1,
            frame: 0,
            tics: 4,
            action: ActionSlot::Hardcoded(ActionId::Fall),
            var1: 0,
            var2: 0,
            next_state: 2,
        };
        states[2] = StateDef {
            sprite: 1,
            frame: 1,
            tics: 4,
            action: ActionSlot::Hardcoded(ActionId::Explode),
            var1: 0,
            var2: 0,
            next_state: 1,
        };
        let mut templates = vec![ObjectTemplate::default(); 4];
        templates[1] = ObjectTemplate {
            doomednum: 100,
            spawnstate: 1,
            spawnhealth: 3,
            radius: Fixed::from_int(16),
            height: Fixed::from_int(48),
            ..ObjectTemplate::default()
        };
        InfoTables {
            sprite_names,
            states,
            templates,
            sounds,
        }
    }

    pub fn check_state_index(&self, index: i64) -> Result<usize, InfoError> {
        check_index("states", index, self.states.len())
    }

    pub fn check_template_index(&self, index: i64) -> Result<usize, InfoError> {
        check_index("mobjinfo", index, self.templates.len())
    }

    pub fn check_sound_index(&self, index: i64) -> Result<usize, InfoError> {
        check_index("sfxinfo", index, self.sounds.len())
    }

    pub fn sprite_index(&self, name: &str) -> Option<usize> {
        self.sprite_names.iter().position(|n| n == name)
    }

    /// Resets a state to the documented defaults ahead of bulk assignment.
    pub fn reset_state(&mut self, index: usize) {
        self.states[index] = StateDef::default();
    }

    pub fn reset_template(&mut self, index: usize) {
        self.templates[index] = ObjectTemplate::default();
    }

    /// Resets a sound's writable fields; the identity fields survive.
    pub fn reset_sound(&mut self, index: usize) {
        let sound = &mut self.sounds[index];
        sound.singular = false;
        sound.priority = 0;
        sound.flags = 0;
    }

    /// Numeric state fields; the action slot is handled by the scripting
    /// layer, which owns the callables.
    pub fn state_field(&self, index: usize, field: &str) -> Result<i64, InfoError> {
        let st = &self.states[index];
        Ok(match field {
            "sprite" => st.sprite as i64,
            "frame" => st.frame as i64,
            "tics" => st.tics as i64,
            "var1" => st.var1 as i64,
            "var2" => st.var2 as i64,
            "nextstate" => st.next_state as i64,
            _ => {
                return Err(InfoError::UnknownField {
                    kind: "state_t",
                    field: field.to_string(),
                })
            }
        })
    }

    pub fn set_state_field(
        &mut self,
        index: usize,
        field: &str,
        value: i64,
    ) -> Result<(), InfoError> {
        let sprite_count = self.sprite_names.len() as i64;
        let state_count = self.states.len() as i64;
        let st = &mut self.states[index];
        match field {
            "sprite" => {
                if value < 0 || value >= sprite_count {
                    return Err(InfoError::InvalidValue {
                        field: "sprite",
                        value,
                    });
                }
                st.sprite = value as i32;
            }
            "frame" => st.frame = value as u32,
            "tics" => st.tics = value as i32,
            "var1" => st.var1 = value as i32,
            "var2" => st.var2 = value as i32,
            "nextstate" => {
                if value < 0 || value >= state_count {
                    return Err(InfoError::InvalidValue {
                        field: "nextstate",
                        value,
                    });
                }
                st.next_state = value as usize;
            }
            _ => {
                return Err(InfoError::UnknownField {
                    kind: "state_t",
                    field: field.to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn template_field(&self, index: usize, field: &str) -> Result<i64, InfoError> {
        let info = &self.templates[index];
        Ok(match field {
            "doomednum" => info.doomednum as i64,
            "spawnstate" => info.spawnstate as i64,
            "spawnhealth" => info.spawnhealth as i64,
            "seestate" => info.seestate as i64,
            "seesound" => info.seesound as i64,
            "reactiontime" => info.reactiontime as i64,
            "attacksound" => info.attacksound as i64,
            "painstate" => info.painstate as i64,
            "painchance" => info.painchance as i64,
            "painsound" => info.painsound as i64,
            "meleestate" => info.meleestate as i64,
            "missilestate" => info.missilestate as i64,
            "deathstate" => info.deathstate as i64,
            "xdeathstate" => info.xdeathstate as i64,
            "deathsound" => info.deathsound as i64,
            "speed" => info.speed as i64,
            "radius" => info.radius.raw() as i64,
            "height" => info.height.raw() as i64,
            "dispoffset" => info.dispoffset as i64,
            "mass" => info.mass as i64,
            "damage" => info.damage as i64,
            "activesound" => info.activesound as i64,
            "flags" => info.flags as i64,
            "raisestate" => info.raisestate as i64,
            _ => {
                return Err(InfoError::UnknownField {
                    kind: "mobjinfo_t",
                    field: field.to_string(),
                })
            }
        })
    }

    /// Single-field template set. Range validation only happens during
    /// bulk assignment; single writes take the value as given.
    pub fn set_template_field(
        &mut self,
        index: usize,
        field: &str,
        value: i64,
    ) -> Result<(), InfoError> {
        let info = &mut self.templates[index];
        match field {
            "doomednum" => info.doomednum = value as i32,
            "spawnstate" => info.spawnstate = value as usize,
            "spawnhealth" => info.spawnhealth = value as i32,
            "seestate" => info.seestate = value as usize,
            "seesound" => info.seesound = value as usize,
            "reactiontime" => info.reactiontime = value as i32,
            "attacksound" => info.attacksound = value as usize,
            "painstate" => info.painstate = value as usize,
            "painchance" => info.painchance = value as i32,
            "painsound" => info.painsound = value as usize,
            "meleestate" => info.meleestate = value as usize,
            "missilestate" => info.missilestate = value as usize,
            "deathstate" => info.deathstate = value as usize,
            "xdeathstate" => info.xdeathstate = value as usize,
            "deathsound" => info.deathsound = value as usize,
            "speed" => info.speed = value as i32,
            "radius" => info.radius = Fixed::from_raw(value as i32),
            "height" => info.height = Fixed::from_raw(value as i32),
            "dispoffset" => info.dispoffset = value as i32,
            "mass" => info.mass = value as i32,
            "damage" => info.damage = value as i32,
            "activesound" => info.activesound = value as usize,
            "flags" => info.flags = value as u32,
            "raisestate" => info.raisestate = value as usize,
            _ => {
                return Err(InfoError::UnknownField {
                    kind: "mobjinfo_t",
                    field: field.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Bulk-assignment template set: validates the state and sound
    /// references that would wedge the spawner if they dangled.
    pub fn set_template_field_bulk(
        &mut self,
        index: usize,
        field: &str,
        value: i64,
    ) -> Result<(), InfoError> {
        match field {
            "spawnstate" | "seestate" => {
                if value < 0 || value >= self.states.len() as i64 {
                    return Err(InfoError::InvalidValue {
                        field: if field == "spawnstate" {
                            "spawnstate"
                        } else {
                            "seestate"
                        },
                        value,
                    });
                }
            }
            "seesound" => {
                if value < 0 || value >= self.sounds.len() as i64 {
                    return Err(InfoError::InvalidValue {
                        field: "seesound",
                        value,
                    });
                }
            }
            _ => {}
        }
        self.set_template_field(index, field, value)
    }

    pub fn sound_field(&self, index: usize, field: &str) -> Result<FieldValue, InfoError> {
        let sound = &self.sounds[index];
        Ok(match field {
            "name" => FieldValue::Str(sound.name.clone()),
            "singular" => FieldValue::Bool(sound.singular),
            "priority" => FieldValue::Int(sound.priority as i64),
            "flags" => FieldValue::Int(sound.flags as i64),
            "skinsound" => FieldValue::Int(sound.skin_sound as i64),
            _ => {
                return Err(InfoError::UnknownField {
                    kind: "sfxinfo_t",
                    field: field.to_string(),
                })
            }
        })
    }

    pub fn set_sound_field(
        &mut self,
        index: usize,
        field: &str,
        value: FieldValue,
    ) -> Result<(), InfoError> {
        let sound = &mut self.sounds[index];
        match (field, value) {
            ("singular", FieldValue::Bool(b)) => sound.singular = b,
            ("singular", _) => {
                return Err(InfoError::InvalidValue {
                    field: "singular",
                    value: 0,
                })
            }
            ("priority", FieldValue::Int(v)) => sound.priority = v as i32,
            ("flags", FieldValue::Int(v)) => sound.flags = v as i32,
            ("priority" | "flags", _) => {
                return Err(InfoError::InvalidValue {
                    field: if field == "priority" { "priority" } else { "flags" },
                    value: 0,
                })
            }
            ("name" | "skinsound", _) => {
                return Err(InfoError::ReadOnly {
                    kind: "sfxinfo_t",
                    field: field.to_string(),
                })
            }
            (_, _) => {
                return Err(InfoError::UnknownField {
                    kind: "sfxinfo_t",
                    field: field.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn check_index(kind: &'static str, index: i64, len: usize) -> Result<usize, InfoError> {
    if index < 0 || index >= len as i64 {
        Err(InfoError::IndexOutOfRange {
            kind,
            index,
            max: len as i64 - 1,
        })
    } else {
        Ok(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    #[test]
    fn bulk_reset_restores_the_documented_defaults() {
        let mut info = InfoTables::with_baseline();
        info.templates[1].doomednum = 555;
        info.templates[1].mass = 12;
        info.reset_template(1);
        // Unlisted fields come out as the sentinel defaults, not zero and
        // not the stale previous values.
        assert_eq!(info.templates[1].doomednum, -1);
        assert_eq!(info.templates[1].spawnhealth, 1);
        assert_eq!(info.templates[1].mass, 0);

        info.states[1].frame = 9;
        info.reset_state(1);
        assert_eq!(info.states[1].tics, -1);
        assert_eq!(info.states[1].frame, 0);
        assert_eq!(info.states[1].action, ActionSlot::None);
    }

    #[test]
    fn sound_reset_keeps_the_identity_fields() {
        let mut info = InfoTables::with_baseline();
        info.sounds[1].singular = true;
        info.sounds[1].priority = 200;
        info.reset_sound(1);
        assert_eq!(info.sounds[1].name, "thok");
        assert!(!info.sounds[1].singular);
        assert_eq!(info.sounds[1].priority, 0);
    }

    #[test]
    fn out_of_range_indices_are_errors_not_clamps() {
        let info = InfoTables::with_baseline();
        assert!(info.check_state_index(7).is_ok());
        assert!(matches!(
            info.check_state_index(8),
            Err(InfoError::IndexOutOfRange { kind: "states", .. })
        ));
        assert!(matches!(
            info.check_template_index(-1),
            Err(InfoError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn sprite_and_nextstate_values_are_range_checked() {
        let mut info = InfoTables::with_baseline();
        assert!(info.set_state_field(1, "sprite", 2).is_ok());
        assert!(matches!(
            info.set_state_field(1, "sprite", 99),
            Err(InfoError::InvalidValue { field: "sprite", .. })
        ));
        assert!(matches!(
            info.set_state_field(1, "nextstate", 800),
            Err(InfoError::InvalidValue { field: "nextstate", .. })
        ));
    }

    #[test]
    fn forbidden_phases_reject_mutation_and_release_cleanly() {
        let phase = PhaseContext::new();
        {
            let _render = phase.enter(Phase::Render);
            let err = ensure_mutable(&phase, "states").expect_err("render phase must reject");
            assert!(matches!(err, InfoError::ForbiddenPhase { .. }));
            assert_eq!(
                err.to_string(),
                "Do not alter states in rendering code!"
            );
        }
        assert!(ensure_mutable(&phase, "states").is_ok());
    }

    #[test]
    fn sound_identity_fields_are_read_only() {
        let mut info = InfoTables::with_baseline();
        assert!(matches!(
            info.set_sound_field(0, "name", FieldValue::Str("x".into())),
            Err(InfoError::ReadOnly { .. })
        ));
        assert!(info
            .set_sound_field(0, "singular", FieldValue::Bool(true))
            .is_ok());
        assert!(info.sounds[0].singular);
    }

    #[test]
    fn positional_codes_map_one_based_onto_the_catalogue() {
        assert_eq!(field_by_code(STATE_FIELDS, 1), Some("sprite"));
        assert_eq!(field_by_code(STATE_FIELDS, 7), Some("nextstate"));
        assert_eq!(field_by_code(STATE_FIELDS, 0), None);
        assert_eq!(field_by_code(STATE_FIELDS, 8), None);
        assert_eq!(field_by_code(TEMPLATE_FIELDS, 24), Some("raisestate"));
    }
}
