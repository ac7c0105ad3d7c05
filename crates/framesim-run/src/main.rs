//! Framesim Run - loads a scene and drives it from a command shell
//!
//! With `--frames`, runs the scene once and exits; otherwise reads
//! commands from stdin.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use framesim_catalog::Catalog;
use framesim_run::{Settings, Shell, load_scene};
use framesim_runtime::Engine;
use framesim_runtime::value::DisplayRecord;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "framesim-run")]
#[command(about = "Run framesim scenes from a command shell")]
struct Cli {
    /// Scene file to load at startup
    scene: Option<PathBuf>,

    /// Settings file, created on the first `set`
    #[arg(long, default_value = "engine.yaml")]
    settings: PathBuf,

    /// Worker threads (0 = one per core)
    #[arg(long, default_value = "0")]
    threads: usize,

    /// Run this many frames, print the routed records and exit
    #[arg(long)]
    frames: Option<u64>,
}

fn main() -> Result<()> {
    framesim_run::init_logging();
    let cli = Cli::parse();

    let settings = Settings::load(&cli.settings)
        .with_context(|| format!("reading settings {}", cli.settings.display()))?;
    let mut engine =
        Engine::new(settings.engine_settings(cli.threads)).context("starting engine")?;

    if let Some(path) = &cli.scene {
        info!("Loading scene from: {}", path.display());
        let scene = load_scene(path)?;
        engine
            .load(&scene, &Catalog)
            .with_context(|| format!("loading scene {}", path.display()))?;
    }

    if let Some(frames) = cli.frames {
        if cli.scene.is_none() {
            bail!("--frames needs a scene file");
        }
        let report = engine.run(frames)?;
        println!(
            "ran {} frames in {:.3}s, fps: {:.1}",
            report.frames,
            report.elapsed.as_secs_f64(),
            report.fps
        );
        for (topic, records) in engine.routed() {
            println!("{topic}:");
            for record in &records {
                println!("\t{}", DisplayRecord(record));
            }
        }
        return Ok(());
    }

    let mut shell = Shell::new(engine, settings, cli.settings, Box::new(std::io::stdout()));
    shell.repl(std::io::stdin().lock())?;
    Ok(())
}
