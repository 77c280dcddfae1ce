#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Thornfall Defence session.

mod session;

use std::time::Duration;

use clap::Parser;
use thornfall_core::{Event, ResourceKind};
use tracing_subscriber::EnvFilter;

use crate::session::Session;

/// Runs a deterministic Thornfall Defence session without a renderer.
#[derive(Debug, Parser)]
#[command(name = "thornfall", version)]
struct Args {
    /// Seed shared by terrain population and both directors.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Simulated session length in seconds.
    #[arg(long, default_value_t = 180)]
    duration: u64,

    /// Fixed simulation tick in milliseconds.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
}

/// Entry point for the Thornfall Defence command-line interface.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.tick_ms > 0, "tick must be non-zero");
    let tick = Duration::from_millis(args.tick_ms);
    let ticks = Duration::from_secs(args.duration).as_millis() / u128::from(args.tick_ms);

    let mut session = Session::new(args.seed);
    for _ in 0..ticks {
        for event in session.update(tick) {
            report(&event);
        }
        if session.game_over() {
            break;
        }
    }

    println!("--- session summary ---");
    println!("waves reached:    {}", session.wave());
    println!("enemies slain:    {}", session.slain());
    println!("defenders placed: {}", session.defenders_placed());
    println!(
        "stockpile:        {} wood, {} stone",
        session.stock(ResourceKind::Wood),
        session.stock(ResourceKind::Stone)
    );
    println!("objective health: {}", session.objective_health());
    if session.game_over() {
        println!("the objective fell");
    }
    Ok(())
}

fn report(event: &Event) {
    match event {
        Event::WaveStarted { wave, total } => {
            tracing::info!(wave, total, "wave started");
        }
        Event::WaveCompleted { wave, reward } => {
            tracing::info!(wave, ?reward, "wave completed");
        }
        Event::ObjectiveDestroyed => {
            tracing::warn!("objective destroyed");
        }
        _ => {}
    }
}
