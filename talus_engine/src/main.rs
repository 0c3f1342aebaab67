use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use talus_engine::actor::Actor;
use talus_engine::info::InfoTables;
use talus_engine::lua_host::ScriptHost;
use talus_engine::phase::PhaseContext;
use talus_engine::scheduler::DynSlopeScheduler;
use talus_engine::slope::{self, SlopeRegistry};
use talus_map::{Fixed, LevelData};

mod cli;
use cli::Args;

#[derive(Serialize)]
struct SlopeSnapshot {
    id: u16,
    origin_z: i32,
    zdelta: i32,
    zangle: u32,
    xydirection: u32,
    flags: u8,
    generation: u32,
}

fn units(value: Fixed) -> f64 {
    value.raw() as f64 / Fixed::UNIT.raw() as f64
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let data = fs::read_to_string(&args.level)
        .with_context(|| format!("reading level document from {}", args.level.display()))?;
    let mut level: LevelData = serde_json::from_str(&data)
        .with_context(|| format!("parsing level JSON from {}", args.level.display()))?;

    let mut slopes = SlopeRegistry::new();
    let mut sched = DynSlopeScheduler::new();
    slope::spawn_level_slopes(&mut level, &mut slopes, &mut sched, false)
        .context("spawning level slopes")?;
    println!(
        "[slope] spawned {} slopes ({} dynamic)",
        slopes.len(),
        sched.pending_len()
    );
    sched.commit();

    let scripting = match &args.script {
        Some(path) => {
            let info = Rc::new(RefCell::new(InfoTables::with_baseline()));
            let phase = Rc::new(PhaseContext::new());
            let host = ScriptHost::new(info.clone(), phase).context("creating the Lua host")?;
            let source = fs::read_to_string(path)
                .with_context(|| format!("reading script from {}", path.display()))?;
            host.load_script(&source, &path.display().to_string())?;
            println!("[script] loaded {}", path.display());
            Some((host, info))
        }
        None => None,
    };

    let demo_actor = Rc::new(RefCell::new(Actor::new()));
    demo_actor.borrow_mut().state = 1;

    for tick in 0..args.ticks {
        if let Some(sector) = args.raise_sector {
            level.sectors[sector].floor_height += Fixed::from_int(args.raise_step);
        }
        sched.run_tick(&level, &mut slopes);

        if let Some((host, info)) = &scripting {
            let state = demo_actor.borrow().state;
            host.run_state_action(&demo_actor, state)?;
            let next = info.borrow().states[state].next_state;
            demo_actor.borrow_mut().state = next;
        }

        if args.verbose {
            for s in slopes.iter() {
                println!(
                    "[tick {tick}] slope #{} zdelta {:.4} origin_z {:.2} generation {}",
                    s.id.raw(),
                    units(s.zdelta),
                    units(s.origin.z),
                    s.generation
                );
            }
        }
    }

    let sample_x = Fixed::from_int(args.sample_x);
    let sample_y = Fixed::from_int(args.sample_y);
    for i in 0..level.sectors.len() {
        let floor = slope::sector_floor_z_at(&level, &slopes, i, sample_x, sample_y);
        let ceiling = slope::sector_ceiling_z_at(&level, &slopes, i, sample_x, sample_y);
        println!(
            "[sample] sector {i} floor {:.2} ceiling {:.2}",
            units(floor),
            units(ceiling)
        );
    }

    if scripting.is_some() {
        let actor = demo_actor.borrow();
        println!(
            "[actor] state {} health {} momz {:.2}",
            actor.state,
            actor.health,
            units(actor.momz)
        );
    }

    if let Some(path) = &args.snapshot_json {
        let snapshot: Vec<SlopeSnapshot> = slopes
            .iter()
            .map(|s| SlopeSnapshot {
                id: s.id.raw(),
                origin_z: s.origin.z.raw(),
                zdelta: s.zdelta.raw(),
                zangle: s.zangle.raw(),
                xydirection: s.xydirection.raw(),
                flags: s.flags,
                generation: s.generation,
            })
            .collect();
        let serialized =
            serde_json::to_string_pretty(&snapshot).context("serializing the slope snapshot")?;
        fs::write(path, serialized)
            .with_context(|| format!("writing slope snapshot to {}", path.display()))?;
        println!("[slope] wrote snapshot to {}", path.display());
    }

    Ok(())
}
