use std::fs;
use std::process::Command;

use anyhow::{Context, Result};
use serde::Deserialize;
use tempfile::tempdir;

use talus_map::{line_flags, Fixed, LevelData, Line, Sector, Side, Vertex};

#[derive(Debug, Deserialize)]
struct SlopeSnapshot {
    id: u16,
    zdelta: i32,
    generation: u32,
}

/// Two square sectors sharing a control line with a dynamic front-floor
/// slope special.
fn demo_level() -> LevelData {
    let u = Fixed::from_int;
    let vertices = vec![
        Vertex { x: u(0), y: u(0) },
        Vertex { x: u(64), y: u(0) },
        Vertex { x: u(64), y: u(64) },
        Vertex { x: u(0), y: u(64) },
        Vertex { x: u(128), y: u(0) },
        Vertex { x: u(128), y: u(64) },
    ];
    let lines = vec![
        Line { v1: 0, v2: 1, front_sector: Some(0), ..Line::default() },
        Line { v1: 3, v2: 0, front_sector: Some(0), ..Line::default() },
        Line { v1: 2, v2: 3, front_sector: Some(0), ..Line::default() },
        Line {
            v1: 2,
            v2: 1,
            special: 700,
            flags: line_flags::SLOPE_DYNAMIC,
            front_sector: Some(0),
            back_sector: Some(1),
            front_side: Some(0),
            ..Line::default()
        },
        Line { v1: 1, v2: 4, front_sector: Some(1), ..Line::default() },
        Line { v1: 4, v2: 5, front_sector: Some(1), ..Line::default() },
        Line { v1: 5, v2: 2, front_sector: Some(1), ..Line::default() },
    ];
    let sectors = vec![
        Sector {
            floor_height: u(0),
            ceiling_height: u(128),
            lines: vec![0, 1, 2, 3],
            ..Sector::default()
        },
        Sector {
            floor_height: u(32),
            ceiling_height: u(128),
            lines: vec![3, 4, 5, 6],
            ..Sector::default()
        },
    ];
    LevelData {
        vertices,
        sides: vec![Side {
            sector: 0,
            ..Side::default()
        }],
        lines,
        sectors,
        things: Vec::new(),
    }
}

#[test]
fn demo_binary_simulates_a_dynamic_slope_and_scripted_override() -> Result<()> {
    let dir = tempdir().context("creating temporary directory")?;

    let level_path = dir.path().join("level.json");
    fs::write(
        &level_path,
        serde_json::to_string_pretty(&demo_level()).context("serializing level")?,
    )
    .context("writing level document")?;

    let script_path = dir.path().join("mod.lua");
    fs::write(
        &script_path,
        r#"
            function A_Fall(mo, var1, var2)
                mo.health = 99
            end
            -- keep the demo actor looping through the overridden state
            states[1] = { action = "A_Fall", nextstate = 1, tics = 1 }
            mobjinfo[1] = { doomednum = 200, spawnhealth = 9 }
        "#,
    )
    .context("writing script")?;

    let snapshot_path = dir.path().join("slopes.json");

    let output = Command::new(env!("CARGO_BIN_EXE_talus_engine"))
        .args([
            "--level",
            level_path.to_str().context("level path utf-8")?,
            "--script",
            script_path.to_str().context("script path utf-8")?,
            "--ticks",
            "4",
            "--raise-sector",
            "1",
            "--raise-step",
            "8",
            "--snapshot-json",
            snapshot_path.to_str().context("snapshot path utf-8")?,
        ])
        .output()
        .context("executing talus_engine demo")?;

    assert!(
        output.status.success(),
        "talus_engine exited with {:?}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        stdout.contains("[slope] spawned 1 slopes (1 dynamic)"),
        "spawn marker missing: {stdout}"
    );
    // The scripted override replaced the hardcoded fall action.
    assert!(
        stdout.contains("health 99"),
        "scripted action marker missing: {stdout}"
    );

    let snapshot: Vec<SlopeSnapshot> = serde_json::from_str(
        &fs::read_to_string(&snapshot_path).context("reading snapshot")?,
    )
    .context("parsing snapshot")?;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, 1);
    // Four ticks of a rising back floor steepened the plane beyond its
    // spawn-time rise of 32 over 64.
    assert!(
        snapshot[0].zdelta > Fixed::UNIT.raw() / 2,
        "zdelta {:?}",
        snapshot[0].zdelta
    );
    assert!(snapshot[0].generation >= 1);

    Ok(())
}
