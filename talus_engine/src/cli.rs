use std::path::PathBuf;

use clap::Parser;

/// Demo host that spawns a level's slopes and simulates them.
#[derive(Parser, Debug)]
#[command(about = "Slope geometry demo host for talus level documents", version)]
pub struct Args {
    /// Path to the level JSON document
    #[arg(long)]
    pub level: PathBuf,

    /// Optional Lua script to load before simulating
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Number of simulation ticks to run
    #[arg(long, default_value_t = 35)]
    pub ticks: u32,

    /// Sector whose floor rises every tick
    #[arg(long)]
    pub raise_sector: Option<usize>,

    /// Floor rise per tick, in map units
    #[arg(long, default_value_t = 4)]
    pub raise_step: i32,

    /// X of the height sample point, in map units
    #[arg(long, default_value_t = 32)]
    pub sample_x: i32,

    /// Y of the height sample point, in map units
    #[arg(long, default_value_t = 32)]
    pub sample_y: i32,

    /// Path to write the slope registry snapshot as JSON
    #[arg(long)]
    pub snapshot_json: Option<PathBuf>,

    /// Print per-tick slope state
    #[arg(long)]
    pub verbose: bool,
}
