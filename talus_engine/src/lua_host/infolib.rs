use log::debug;
use mlua::{
    Error as LuaError, Lua, MetaMethod, MultiValue, Result as LuaResult, Table, UserData,
    UserDataMethods, Value,
};

use crate::actions::ActionId;
use crate::info::{
    ensure_mutable, field_by_code, ActionSlot, FieldValue, SOUND_FIELDS, STATE_FIELDS,
    TEMPLATE_FIELDS,
};

use super::{make_action_callable, HostHandles};

/// Installs the reflective array facades as globals. Every proxy is a
/// zero-field userdata with metamethods; Lua 5.1 tables would not honor
/// `__len`.
pub(super) fn install(lua: &Lua, h: &HostHandles) -> LuaResult<()> {
    let globals = lua.globals();
    globals.raw_set("sprnames", SpriteNames(h.clone()))?;
    globals.raw_set("states", States(h.clone()))?;
    globals.raw_set("mobjinfo", Templates(h.clone()))?;
    globals.raw_set("sfxinfo", Sounds(h.clone()))?;
    globals.raw_set("S_sfx", Sounds(h.clone()))?;
    Ok(())
}

fn value_as_index(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Number(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

fn value_as_name<'a>(value: &'a Value) -> Option<&'a str> {
    match value {
        Value::String(s) => s.to_str().ok(),
        _ => None,
    }
}

fn key_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_str().unwrap_or("?").to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.type_name().to_string(),
    }
}

/// Resolves a bulk-assignment key: positional codes are 1-based into the
/// catalogue, strings must match a catalogued name. Anything else is
/// silently skipped so user tables with extra keys still load.
fn resolve_bulk_field(key: &Value, catalogue: &[&'static str]) -> Option<&'static str> {
    if let Some(code) = value_as_index(key) {
        if code > 0 {
            return field_by_code(catalogue, code as usize);
        }
        return None;
    }
    value_as_name(key).and_then(|name| catalogue.iter().copied().find(|f| *f == name))
}

fn check_integer(value: &Value, field: &str) -> LuaResult<i64> {
    value_as_index(value)
        .or_else(|| match value {
            Value::Number(n) => Some(*n as i64),
            _ => None,
        })
        .ok_or_else(|| {
            LuaError::RuntimeError(format!(
                "bad value for '{field}' (integer expected, got {})",
                value.type_name()
            ))
        })
}

/// Applies a value to a state's action slot: nil clears it, a string names
/// either a hardcoded action or a registered scripted one, and a function
/// binds anonymously to the state's identity.
fn apply_state_action(lua: &Lua, h: &HostHandles, index: usize, value: Value) -> LuaResult<()> {
    match value {
        Value::Nil => {
            h.info.borrow_mut().states[index].action = ActionSlot::None;
        }
        Value::String(s) => {
            let canon = s.to_str()?.to_ascii_uppercase();
            if let Some(id) = ActionId::from_name(&canon) {
                h.info.borrow_mut().states[index].action = ActionSlot::Hardcoded(id);
            } else {
                let actions: Table = lua.registry_value(&h.actions_key)?;
                match actions.raw_get::<_, Value>(canon.as_str())? {
                    Value::Function(f) => bind_state_function(lua, h, index, f)?,
                    _ => {
                        return Err(LuaError::RuntimeError(format!(
                            "unknown action name '{canon}'"
                        )))
                    }
                }
            }
        }
        Value::Function(f) => bind_state_function(lua, h, index, f)?,
        other => {
            return Err(LuaError::RuntimeError(format!(
                "action expects nil, a string, or a function (got {})",
                other.type_name()
            )))
        }
    }
    Ok(())
}

fn bind_state_function(
    lua: &Lua,
    h: &HostHandles,
    index: usize,
    func: mlua::Function,
) -> LuaResult<()> {
    let bound: Table = lua.registry_value(&h.state_actions_key)?;
    bound.raw_set(index as i64, func)?;
    h.info.borrow_mut().states[index].action = ActionSlot::Scripted;
    Ok(())
}

// -- sprite names -----------------------------------------------------------

struct SpriteNames(HostHandles);

impl UserData for SpriteNames {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            let info = this.0.info.borrow();
            if let Some(i) = value_as_index(&key) {
                if i >= 0 && (i as usize) < info.sprite_names.len() {
                    return Ok(Value::String(
                        lua.create_string(&info.sprite_names[i as usize])?,
                    ));
                }
                return Ok(Value::Nil);
            }
            if let Some(name) = value_as_name(&key) {
                if let Some(i) = info.sprite_index(name) {
                    return Ok(Value::Integer(i as i64));
                }
            }
            Ok(Value::Nil)
        });
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| {
            Ok(this.0.info.borrow().sprite_names.len() as i64)
        });
    }
}

// -- states -----------------------------------------------------------------

struct States(HostHandles);

impl UserData for States {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |_, this, index: i64| {
            let idx = this
                .0
                .info
                .borrow()
                .check_state_index(index)
                .map_err(LuaError::external)?;
            Ok(StateRef {
                h: this.0.clone(),
                index: idx,
            })
        });
        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (index, table): (i64, Table)| {
                let h = &this.0;
                let idx = h
                    .info
                    .borrow()
                    .check_state_index(index)
                    .map_err(LuaError::external)?;
                ensure_mutable(&h.phase, "states").map_err(LuaError::external)?;

                // Reset first: fields missing from the table keep the
                // documented defaults, not the previous values.
                h.info.borrow_mut().reset_state(idx);
                for pair in table.pairs::<Value, Value>() {
                    let (key, value) = pair?;
                    let Some(field) = resolve_bulk_field(&key, STATE_FIELDS) else {
                        continue;
                    };
                    if field == "action" {
                        apply_state_action(lua, h, idx, value)?;
                        continue;
                    }
                    let v = check_integer(&value, field)?;
                    h.info
                        .borrow_mut()
                        .set_state_field(idx, field, v)
                        .map_err(LuaError::external)?;
                }
                Ok(())
            },
        );
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| {
            Ok(this.0.info.borrow().states.len() as i64)
        });
    }
}

struct StateRef {
    h: HostHandles,
    index: usize,
}

impl UserData for StateRef {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            let Some(field) = value_as_name(&key).filter(|f| STATE_FIELDS.contains(f)) else {
                debug!(
                    "'state_t' has no field named '{}'; returning nil",
                    key_display(&key)
                );
                return Ok(MultiValue::new());
            };
            if field == "action" {
                let slot = this.h.info.borrow().states[this.index].action;
                return match slot {
                    ActionSlot::None => Ok(MultiValue::new()),
                    ActionSlot::Scripted => {
                        let bound: Table = lua.registry_value(&this.h.state_actions_key)?;
                        let value: Value = bound.raw_get(this.index as i64)?;
                        Ok(MultiValue::from_vec(vec![value]))
                    }
                    ActionSlot::Hardcoded(id) => {
                        let func =
                            make_action_callable(lua, &this.h, id.name().to_string())?;
                        Ok(MultiValue::from_vec(vec![
                            Value::Function(func),
                            Value::String(lua.create_string(id.name())?),
                        ]))
                    }
                };
            }
            let value = this
                .h
                .info
                .borrow()
                .state_field(this.index, field)
                .map_err(LuaError::external)?;
            Ok(MultiValue::from_vec(vec![Value::Integer(value)]))
        });
        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, value): (Value, Value)| {
                ensure_mutable(&this.h.phase, "states").map_err(LuaError::external)?;
                let Some(field) = value_as_name(&key).filter(|f| STATE_FIELDS.contains(f)) else {
                    return Err(LuaError::RuntimeError(format!(
                        "'state_t' has no field named '{}'",
                        key_display(&key)
                    )));
                };
                if field == "action" {
                    return apply_state_action(lua, &this.h, this.index, value);
                }
                let v = check_integer(&value, field)?;
                this.h
                    .info
                    .borrow_mut()
                    .set_state_field(this.index, field, v)
                    .map_err(LuaError::external)
            },
        );
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.index as i64));
    }
}

// -- object templates -------------------------------------------------------

struct Templates(HostHandles);

impl UserData for Templates {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |_, this, index: i64| {
            let idx = this
                .0
                .info
                .borrow()
                .check_template_index(index)
                .map_err(LuaError::external)?;
            Ok(TemplateRef {
                h: this.0.clone(),
                index: idx,
            })
        });
        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (index, table): (i64, Table)| {
                let h = &this.0;
                let idx = h
                    .info
                    .borrow()
                    .check_template_index(index)
                    .map_err(LuaError::external)?;
                ensure_mutable(&h.phase, "mobjinfo").map_err(LuaError::external)?;

                h.info.borrow_mut().reset_template(idx);
                for pair in table.pairs::<Value, Value>() {
                    let (key, value) = pair?;
                    let Some(field) = resolve_bulk_field(&key, TEMPLATE_FIELDS) else {
                        continue;
                    };
                    let v = check_integer(&value, field)?;
                    h.info
                        .borrow_mut()
                        .set_template_field_bulk(idx, field, v)
                        .map_err(LuaError::external)?;
                }
                Ok(())
            },
        );
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| {
            Ok(this.0.info.borrow().templates.len() as i64)
        });
    }
}

struct TemplateRef {
    h: HostHandles,
    index: usize,
}

impl UserData for TemplateRef {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            if let Some(field) = value_as_name(&key).filter(|f| TEMPLATE_FIELDS.contains(f)) {
                let value = this
                    .h
                    .info
                    .borrow()
                    .template_field(this.index, field)
                    .map_err(LuaError::external)?;
                return Ok(Value::Integer(value));
            }
            // Unknown names fall back to the open extension table.
            let ext: Table = lua.registry_value(&this.h.ext_fields_key)?;
            match ext.raw_get::<_, Value>(this.index as i64)? {
                Value::Table(per_record) => {
                    let value: Value = per_record.get(key.clone())?;
                    if value.is_nil() {
                        debug!(
                            "'mobjinfo_t' has no field named '{}'; returning nil",
                            key_display(&key)
                        );
                    }
                    Ok(value)
                }
                _ => {
                    debug!(
                        "'mobjinfo_t' has no field named '{}'; returning nil",
                        key_display(&key)
                    );
                    Ok(Value::Nil)
                }
            }
        });
        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, value): (Value, Value)| {
                ensure_mutable(&this.h.phase, "mobjinfo").map_err(LuaError::external)?;
                if let Some(field) = value_as_name(&key).filter(|f| TEMPLATE_FIELDS.contains(f)) {
                    let v = check_integer(&value, field)?;
                    return this
                        .h
                        .info
                        .borrow_mut()
                        .set_template_field(this.index, field, v)
                        .map_err(LuaError::external);
                }
                let ext: Table = lua.registry_value(&this.h.ext_fields_key)?;
                let per_record = match ext.raw_get::<_, Value>(this.index as i64)? {
                    Value::Table(t) => t,
                    _ => {
                        debug!(
                            "'mobjinfo_t' has no field named '{}'; adding it as script data",
                            key_display(&key)
                        );
                        let t = lua.create_table()?;
                        ext.raw_set(this.index as i64, t.clone())?;
                        t
                    }
                };
                per_record.set(key, value)
            },
        );
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.index as i64));
    }
}

// -- sound definitions ------------------------------------------------------

struct Sounds(HostHandles);

impl UserData for Sounds {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |_, this, index: i64| {
            let idx = this
                .0
                .info
                .borrow()
                .check_sound_index(index)
                .map_err(LuaError::external)?;
            Ok(SoundRef {
                h: this.0.clone(),
                index: idx,
            })
        });
        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (index, table): (i64, Table)| {
                let h = &this.0;
                let idx = h
                    .info
                    .borrow()
                    .check_sound_index(index)
                    .map_err(LuaError::external)?;
                ensure_mutable(&h.phase, "sfxinfo").map_err(LuaError::external)?;

                h.info.borrow_mut().reset_sound(idx);
                for pair in table.pairs::<Value, Value>() {
                    let (key, value) = pair?;
                    // Positional sound codes: slot 1 is the read-only name
                    // and is skipped.
                    let field = if let Some(code) = value_as_index(&key) {
                        match code {
                            2 => "singular",
                            3 => "priority",
                            4 => "flags",
                            _ => continue,
                        }
                    } else {
                        match value_as_name(&key) {
                            Some("singular") => "singular",
                            Some("priority") => "priority",
                            Some("flags") => "flags",
                            _ => continue,
                        }
                    };
                    let fv = if field == "singular" {
                        match value {
                            Value::Boolean(b) => FieldValue::Bool(b),
                            other => {
                                return Err(LuaError::RuntimeError(format!(
                                    "bad value for 'singular' (boolean expected, got {})",
                                    other.type_name()
                                )))
                            }
                        }
                    } else {
                        FieldValue::Int(check_integer(&value, field)?)
                    };
                    h.info
                        .borrow_mut()
                        .set_sound_field(idx, field, fv)
                        .map_err(LuaError::external)?;
                }
                Ok(())
            },
        );
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| {
            Ok(this.0.info.borrow().sounds.len() as i64)
        });
    }
}

struct SoundRef {
    h: HostHandles,
    index: usize,
}

impl UserData for SoundRef {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            let Some(field) = value_as_name(&key).filter(|f| SOUND_FIELDS.contains(f)) else {
                return Err(LuaError::RuntimeError(format!(
                    "'sfxinfo_t' has no field named '{}'",
                    key_display(&key)
                )));
            };
            let value = this
                .h
                .info
                .borrow()
                .sound_field(this.index, field)
                .map_err(LuaError::external)?;
            Ok(match value {
                FieldValue::Int(i) => Value::Integer(i),
                FieldValue::Bool(b) => Value::Boolean(b),
                FieldValue::Str(s) => Value::String(lua.create_string(&s)?),
            })
        });
        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (key, value): (Value, Value)| {
                ensure_mutable(&this.h.phase, "sfxinfo").map_err(LuaError::external)?;
                let Some(field) = value_as_name(&key).filter(|f| SOUND_FIELDS.contains(f)) else {
                    return Err(LuaError::RuntimeError(format!(
                        "'sfxinfo_t' has no field named '{}'",
                        key_display(&key)
                    )));
                };
                let fv = match (field, &value) {
                    ("singular", Value::Boolean(b)) => FieldValue::Bool(*b),
                    ("singular", other) => {
                        return Err(LuaError::RuntimeError(format!(
                            "bad value for 'singular' (boolean expected, got {})",
                            other.type_name()
                        )))
                    }
                    ("name", _) | ("skinsound", _) => FieldValue::Int(0),
                    _ => FieldValue::Int(check_integer(&value, field)?),
                };
                this.h
                    .info
                    .borrow_mut()
                    .set_sound_field(this.index, field, fv)
                    .map_err(LuaError::external)
            },
        );
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.index as i64));
    }
}
