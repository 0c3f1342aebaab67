use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context as _, Result};
use log::warn;
use mlua::{
    AnyUserData, Function, Lua, RegistryKey, Result as LuaResult, Table, UserData, UserDataFields,
    Value,
};

use talus_map::Fixed;

use crate::actions::{self, ActionId, NUM_ACTIONS};
use crate::actor::{Actor, ActorRef};
use crate::info::{ActionSlot, InfoTables};
use crate::phase::PhaseContext;

mod infolib;

/// Hard ceiling on nested scripted-action calls. Deeper calls are refused
/// (and swallowed) rather than grown into.
pub const MAX_ACTION_RECURSION: usize = 30;

#[derive(Debug)]
pub(crate) struct HostState {
    /// Names of actions currently executing through dispatch, innermost
    /// last. Used solely to break direct self-recursion and to cap depth.
    superstack: Vec<String>,
    overridden: [bool; NUM_ACTIONS],
}

/// Everything the Lua-side closures need, cloneable into each callback.
#[derive(Clone)]
pub(crate) struct HostHandles {
    pub(crate) info: Rc<RefCell<InfoTables>>,
    pub(crate) phase: Rc<PhaseContext>,
    pub(crate) state: Rc<RefCell<HostState>>,
    /// Registry table: uppercase action name -> scripted callable.
    pub(crate) actions_key: Rc<RegistryKey>,
    /// Registry table: state index -> anonymous scripted callable.
    pub(crate) state_actions_key: Rc<RegistryKey>,
    /// Registry table: template index -> open extension table.
    pub(crate) ext_fields_key: Rc<RegistryKey>,
}

/// Actor userdata handed to scripted actions.
pub struct LuaActor(pub ActorRef);

impl UserData for LuaActor {
    fn add_fields<'lua, F: UserDataFields<'lua, Self>>(fields: &mut F) {
        fields.add_field_method_get("x", |_, this| Ok(this.0.borrow().x.raw()));
        fields.add_field_method_get("y", |_, this| Ok(this.0.borrow().y.raw()));
        fields.add_field_method_get("z", |_, this| Ok(this.0.borrow().z.raw()));
        fields.add_field_method_get("momx", |_, this| Ok(this.0.borrow().momx.raw()));
        fields.add_field_method_set("momx", |_, this, v: i32| {
            this.0.borrow_mut().momx = Fixed::from_raw(v);
            Ok(())
        });
        fields.add_field_method_get("momy", |_, this| Ok(this.0.borrow().momy.raw()));
        fields.add_field_method_set("momy", |_, this, v: i32| {
            this.0.borrow_mut().momy = Fixed::from_raw(v);
            Ok(())
        });
        fields.add_field_method_get("momz", |_, this| Ok(this.0.borrow().momz.raw()));
        fields.add_field_method_set("momz", |_, this, v: i32| {
            this.0.borrow_mut().momz = Fixed::from_raw(v);
            Ok(())
        });
        fields.add_field_method_get("angle", |_, this| Ok(this.0.borrow().angle.raw()));
        fields.add_field_method_set("angle", |_, this, v: u32| {
            this.0.borrow_mut().angle = talus_map::Angle::from_raw(v);
            Ok(())
        });
        fields.add_field_method_get("flags", |_, this| Ok(this.0.borrow().flags));
        fields.add_field_method_set("flags", |_, this, v: u32| {
            this.0.borrow_mut().flags = v;
            Ok(())
        });
        fields.add_field_method_get("health", |_, this| Ok(this.0.borrow().health));
        fields.add_field_method_set("health", |_, this, v: i32| {
            this.0.borrow_mut().health = v;
            Ok(())
        });
        fields.add_field_method_get("state", |_, this| Ok(this.0.borrow().state as i64));
        fields.add_field_method_set("state", |_, this, v: i64| {
            this.0.borrow_mut().state = v as usize;
            Ok(())
        });
        fields.add_field_method_get("friction", |_, this| Ok(this.0.borrow().friction.raw()));
        fields.add_field_method_get("standingslope", |_, this| {
            Ok(this.0.borrow().standing_slope.map(|s| s.raw()))
        });
    }
}

/// The embedded Lua state plus the override tables living in its registry.
///
/// Gameplay code never calls scripted functions directly: it invokes a
/// hardcoded action by [`ActionId`] and [`ScriptHost::call_action`] decides
/// whether a registered override claims it.
pub struct ScriptHost {
    lua: Lua,
    h: HostHandles,
}

impl ScriptHost {
    pub fn new(info: Rc<RefCell<InfoTables>>, phase: Rc<PhaseContext>) -> Result<ScriptHost> {
        let lua = Lua::new();
        let state = Rc::new(RefCell::new(HostState {
            superstack: Vec::new(),
            overridden: [false; NUM_ACTIONS],
        }));
        let actions_key = Rc::new(lua.create_registry_value(lua.create_table()?)?);
        let state_actions_key = Rc::new(lua.create_registry_value(lua.create_table()?)?);
        let ext_fields_key = Rc::new(lua.create_registry_value(lua.create_table()?)?);

        let h = HostHandles {
            info,
            phase,
            state,
            actions_key,
            state_actions_key,
            ext_fields_key,
        };

        install_globals_metatable(&lua, &h)?;
        infolib::install(&lua, &h)?;

        Ok(ScriptHost { lua, h })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn load_script(&self, source: &str, chunk_name: &str) -> Result<()> {
        self.lua
            .load(source)
            .set_name(chunk_name)
            .exec()
            .map_err(|err| anyhow!("executing {chunk_name}: {err}"))
    }

    /// Direct registration path; scripts normally register by assigning a
    /// global `A_*` function instead.
    pub fn register_action(&self, name: &str, func: Function) -> Result<()> {
        let canon = name.to_ascii_uppercase();
        let actions: Table = self.lua.registry_value(&self.h.actions_key)?;
        actions.raw_set(canon.as_str(), func)?;
        if let Some(id) = ActionId::from_name(&canon) {
            self.h.state.borrow_mut().overridden[id.index()] = true;
        }
        Ok(())
    }

    pub fn is_overridden(&self, id: ActionId) -> bool {
        self.h.state.borrow().overridden[id.index()]
    }

    pub fn recursion_depth(&self) -> usize {
        self.h.state.borrow().superstack.len()
    }

    /// Offers a hardcoded action invocation to the scripting layer.
    ///
    /// Returns `Ok(true)` when the action was handled (including the
    /// swallowed recursion-overflow case) and `Ok(false)` when the caller
    /// should run the hardcoded body itself: no override registered, or a
    /// scripted body just re-invoked its own name and gets the stock
    /// behavior once.
    pub fn call_action(
        &self,
        action: ActionId,
        actor: &ActorRef,
        var1: i32,
        var2: i32,
    ) -> Result<bool> {
        let name = action.name();

        if !self.h.state.borrow().overridden[action.index()] {
            return Ok(false);
        }
        {
            let state = self.h.state.borrow();
            if let Some(top) = state.superstack.last() {
                if top.eq_ignore_ascii_case(name) {
                    return Ok(false);
                }
            }
        }

        let actions: Table = self.lua.registry_value(&self.h.actions_key)?;
        let func = match actions.raw_get::<_, Value>(name)? {
            Value::Function(f) => f,
            _ => return Ok(false),
        };

        if self.h.state.borrow().superstack.len() >= MAX_ACTION_RECURSION {
            warn!("max scripted action recursion reached; dropping a call to {name}");
            return Ok(true);
        }

        let ud = self.lua.create_userdata(LuaActor(actor.clone()))?;
        self.h.state.borrow_mut().superstack.push(name.to_string());
        let result = func.call::<_, ()>((ud, var1, var2));
        self.h.state.borrow_mut().superstack.pop();
        if let Err(err) = result {
            warn!("scripted action {name} failed: {err}");
        }
        Ok(true)
    }

    /// Invokes the anonymous scripted function bound to a state. The named
    /// override table is walked by value identity (first match wins) so the
    /// recursion stack can carry a display name when one exists.
    pub fn call_state_action(
        &self,
        state_index: usize,
        actor: &ActorRef,
        var1: i32,
        var2: i32,
    ) -> Result<()> {
        let bound: Table = self.lua.registry_value(&self.h.state_actions_key)?;
        let func = match bound.raw_get::<_, Value>(state_index as i64)? {
            Value::Function(f) => f,
            _ => bail!("state {state_index} has no scripted action bound"),
        };

        let actions: Table = self.lua.registry_value(&self.h.actions_key)?;
        let mut display = None;
        for pair in actions.pairs::<String, Value>() {
            let (name, value) = pair?;
            if let Value::Function(f) = value {
                if f == func {
                    display = Some(name);
                    break;
                }
            }
        }

        let pushed = if let Some(name) = display {
            if self.h.state.borrow().superstack.len() >= MAX_ACTION_RECURSION {
                warn!(
                    "max scripted action recursion reached; dropping the action of state {state_index}"
                );
                return Ok(());
            }
            self.h.state.borrow_mut().superstack.push(name);
            true
        } else {
            false
        };

        let ud = self.lua.create_userdata(LuaActor(actor.clone()))?;
        let result = func.call::<_, ()>((ud, var1, var2));
        if pushed {
            self.h.state.borrow_mut().superstack.pop();
        }
        if let Err(err) = result {
            warn!("scripted action for state {state_index} failed: {err}");
        }
        Ok(())
    }

    /// Runs a state's action slot the way the state machine does: scripted
    /// slots call straight through, hardcoded slots are offered to dispatch
    /// first and only fall back to the Rust body when it declines.
    pub fn run_state_action(&self, actor: &ActorRef, state_index: usize) -> Result<()> {
        let (slot, var1, var2) = {
            let info = self.h.info.borrow();
            let st = info
                .states
                .get(state_index)
                .with_context(|| format!("state {state_index} out of range"))?;
            (st.action, st.var1, st.var2)
        };
        match slot {
            ActionSlot::None => Ok(()),
            ActionSlot::Scripted => self.call_state_action(state_index, actor, var1, var2),
            ActionSlot::Hardcoded(id) => {
                if !self.call_action(id, actor, var1, var2)? {
                    actions::run_hardcoded(id, &mut actor.borrow_mut(), var1, var2);
                }
                Ok(())
            }
        }
    }

    /// Binds an anonymous scripted function directly to a state's identity.
    pub fn bind_state_action(&self, state_index: usize, func: Function) -> Result<()> {
        let bound: Table = self.lua.registry_value(&self.h.state_actions_key)?;
        bound.raw_set(state_index as i64, func)?;
        self.h.info.borrow_mut().states[state_index].action = ActionSlot::Scripted;
        Ok(())
    }

    /// Binds a previously registered scripted action to a state by name.
    /// Returns false (and binds nothing) when no such registration exists.
    pub fn set_state_action_by_name(&self, state_index: usize, name: &str) -> Result<bool> {
        let canon = name.to_ascii_uppercase();
        let actions: Table = self.lua.registry_value(&self.h.actions_key)?;
        match actions.raw_get::<_, Value>(canon.as_str())? {
            Value::Function(f) => {
                self.bind_state_action(state_index, f)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn is_action_name(name: &str) -> bool {
    name.len() > 2 && (name.starts_with("A_") || name.starts_with("a_"))
}

/// Globals are fronted by a metatable so that `function A_Name(...)` in a
/// script lands in the override registry (uppercased) instead of a plain
/// global, and so that reading any action name yields a dispatch-aware
/// callable.
fn install_globals_metatable(lua: &Lua, h: &HostHandles) -> LuaResult<()> {
    let mt = lua.create_table()?;

    let cap = h.clone();
    mt.set(
        "__newindex",
        lua.create_function(
            move |lua, (globals, key, value): (Table, Value, Value)| {
                if let (Value::String(name), Value::Function(func)) = (&key, &value) {
                    if let Ok(name) = name.to_str() {
                        if is_action_name(name) {
                            let canon = name.to_ascii_uppercase();
                            let actions: Table = lua.registry_value(&cap.actions_key)?;
                            actions.raw_set(canon.as_str(), func.clone())?;
                            if let Some(id) = ActionId::from_name(&canon) {
                                cap.state.borrow_mut().overridden[id.index()] = true;
                            }
                            return Ok(());
                        }
                    }
                }
                globals.raw_set(key, value)
            },
        )?,
    )?;

    let cap = h.clone();
    mt.set(
        "__index",
        lua.create_function(move |lua, (_globals, key): (Table, Value)| {
            if let Value::String(name) = &key {
                if let Ok(name) = name.to_str() {
                    if is_action_name(name) {
                        let canon = name.to_ascii_uppercase();
                        let actions: Table = lua.registry_value(&cap.actions_key)?;
                        let registered =
                            matches!(actions.raw_get::<_, Value>(canon.as_str())?, Value::Function(_));
                        if registered || ActionId::from_name(&canon).is_some() {
                            return Ok(Value::Function(make_action_callable(lua, &cap, canon)?));
                        }
                    }
                }
            }
            Ok(Value::Nil)
        })?,
    )?;

    lua.globals().set_metatable(Some(mt));
    Ok(())
}

/// Builds the callable scripts see when they reference an action by name.
/// It runs the scripted override unless that override is the caller itself
/// (the "run default behavior" escape hatch), in which case the hardcoded
/// body executes once.
fn make_action_callable<'lua>(
    lua: &'lua Lua,
    h: &HostHandles,
    canon: String,
) -> LuaResult<Function<'lua>> {
    let cap = h.clone();
    lua.create_function(
        move |lua, (ud, var1, var2): (AnyUserData, Option<i64>, Option<i64>)| {
            let var1 = var1.unwrap_or(0) as i32;
            let var2 = var2.unwrap_or(0) as i32;

            let actions: Table = lua.registry_value(&cap.actions_key)?;
            let scripted = match actions.raw_get::<_, Value>(canon.as_str())? {
                Value::Function(f) => Some(f),
                _ => None,
            };
            let self_call = cap
                .state
                .borrow()
                .superstack
                .last()
                .map_or(false, |top| top.eq_ignore_ascii_case(&canon));

            if let Some(func) = scripted {
                if !self_call {
                    if cap.state.borrow().superstack.len() >= MAX_ACTION_RECURSION {
                        warn!("max scripted action recursion reached; dropping a call to {canon}");
                        return Ok(());
                    }
                    cap.state.borrow_mut().superstack.push(canon.clone());
                    let result = func.call::<_, ()>((ud.clone(), var1, var2));
                    cap.state.borrow_mut().superstack.pop();
                    result?;
                    return Ok(());
                }
            }

            if let Some(id) = ActionId::from_name(&canon) {
                let actor = ud.borrow::<LuaActor>()?;
                actions::run_hardcoded(id, &mut actor.0.borrow_mut(), var1, var2);
            }
            Ok(())
        },
    )
}
