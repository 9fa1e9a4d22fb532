use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tumble::animation::AnimatorKind;
use tumble::character::Notification;
use tumble::physics::{PhysicsEngine, RapierWorld, SandboxWorld};
use tumble::rig::RigSpec;
use tumble::{Stage, StageConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Engine {
    /// rapier2d rigid bodies
    Rapier,
    /// Deterministic position-based engine
    Sandbox,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RON configuration file (defaults to ./tumble.ron if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Posing strategy: direct or target
    #[arg(short, long)]
    animator: Option<AnimatorKind>,

    /// Physics engine
    #[arg(short, long, value_enum, default_value_t = Engine::Sandbox)]
    engine: Engine,

    /// Stop after this many jumps off the ladder (0 runs until --max-seconds)
    #[arg(long, default_value_t = 1)]
    cycles: u64,

    /// Simulated time limit
    #[arg(long, default_value_t = 120.0)]
    max_seconds: f32,

    /// Seed of the jump spin
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let mut config = StageConfig::load(args.config.as_deref())?;
    if let Some(kind) = args.animator {
        config.lifecycle.animator = kind;
    }
    if let Some(seed) = args.seed {
        config.lifecycle.seed = seed;
    }

    let spec = match &config.rig.file {
        Some(path) => RigSpec::from_ron_file(path)
            .with_context(|| format!("Failed to load rig from {:?}", path))?,
        None => RigSpec::humanoid(),
    };

    log::info!(
        "Starting Tumble ({:?} engine, {} animator)",
        args.engine,
        config.lifecycle.animator
    );

    match args.engine {
        Engine::Rapier => run(Stage::<RapierWorld>::rapier(config, &spec)?, &args),
        Engine::Sandbox => run(Stage::<SandboxWorld>::sandbox(config, &spec)?, &args),
    }
}

fn run<P: PhysicsEngine>(mut stage: Stage<P>, args: &Args) -> anyhow::Result<()> {
    let limit_ms = (args.max_seconds.max(0.0) * 1000.0) as u64;

    while stage.now_ms() < limit_ms {
        stage.tick();
        for notification in stage.drain_notifications() {
            report(stage.now_ms(), &notification);
        }
        if args.cycles > 0 && stage.cycles() >= args.cycles {
            break;
        }
    }

    let position = stage.position().unwrap_or_default();
    log::info!(
        "Finished after {:.2}s: {} cycles, state {}, torso at ({:.1}, {:.1})",
        stage.now_ms() as f32 / 1000.0,
        stage.cycles(),
        stage.state(),
        position.x,
        position.y
    );

    if args.cycles > 0 && stage.cycles() < args.cycles {
        anyhow::bail!(
            "Only {} of {} cycles completed within {}s",
            stage.cycles(),
            args.cycles,
            args.max_seconds
        );
    }
    Ok(())
}

fn report(now_ms: u64, notification: &Notification) {
    match notification {
        Notification::StateChanged(state) => log::info!("[{:>6} ms] state: {}", now_ms, state),
        Notification::Dialogue(text) if text.is_empty() => {
            log::debug!("[{:>6} ms] dialogue cleared", now_ms)
        }
        Notification::Dialogue(text) => log::info!("[{:>6} ms] \"{}\"", now_ms, text),
        Notification::ContactCount(count) => {
            log::debug!("[{:>6} ms] ground contacts: {}", now_ms, count)
        }
    }
}
