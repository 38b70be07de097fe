use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use traffic_grid::simulation::{
    explain_with_fallback, spawn_simulator, Command, LocalAnalyst, SimConfig, SimSpeed, SimWorld,
    Weather,
};

#[derive(Parser)]
#[command(name = "traffic_grid")]
#[command(about = "Signal-controlled traffic grid simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u64,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Weather condition (clear, rain, fog)
    #[arg(long, default_value = "clear")]
    weather: Weather,

    /// Speed multiplier for the real-time clock (1, 2 or 5)
    #[arg(long, default_value = "1")]
    speed: SimSpeed,

    /// Intersections per row and column
    #[arg(long, default_value = "3")]
    grid_size: usize,

    /// Run on the real-time clock instead of stepping as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Print a summary every N ticks (0 disables)
    #[arg(long, default_value = "250")]
    summary_every: u64,

    /// Toggle emergency priority at this tick
    #[arg(long)]
    emergency_at: Option<u64>,

    /// Request an optimization explanation at this tick
    #[arg(long)]
    optimize_at: Option<u64>,

    /// Print the final world snapshot as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Draw the ASCII map with each summary
    #[arg(long)]
    map: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = SimConfig {
        grid_size: cli.grid_size,
        ..SimConfig::default()
    };
    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut world = SimWorld::with_config(config, rng).context("invalid simulation config")?;
    if cli.weather != Weather::Clear {
        world.set_weather(cli.weather);
    }
    world.set_speed(cli.speed);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let world = if cli.realtime {
        runtime.block_on(run_realtime(world, &cli))?
    } else {
        run_headless(world, &cli, &runtime)
    };

    report(&world, &cli)
}

/// Step the world as fast as possible
fn run_headless(mut world: SimWorld, cli: &Cli, runtime: &tokio::runtime::Runtime) -> SimWorld {
    info!(
        "Running {} ticks headless ({} weather)",
        cli.ticks,
        world.weather()
    );

    world.start();
    while world.current_tick() < cli.ticks {
        let tick = world.current_tick();
        if cli.emergency_at == Some(tick) {
            world.toggle_emergency();
        }
        if cli.optimize_at == Some(tick) {
            let stats = world.trigger_optimization();
            let deadline = world.config().explanation_timeout;
            let explanation =
                runtime.block_on(explain_with_fallback(&LocalAnalyst, &stats, deadline));
            world.record_explanation(explanation);
        }

        world.tick();

        if !cli.json && cli.summary_every > 0 && world.current_tick() % cli.summary_every == 0 {
            println!("--- After tick {} ---", world.current_tick());
            world.print_summary();
            if cli.map {
                world.draw_map();
            }
            println!();
        }
    }
    world.pause();
    world
}

/// Drive the world with the tokio clock and scripted commands
async fn run_realtime(world: SimWorld, cli: &Cli) -> Result<SimWorld> {
    info!(
        "Running {} ticks on the real-time clock at {}",
        cli.ticks,
        world.speed()
    );

    let (handle, task) = spawn_simulator(world, LocalAnalyst);
    let mut snapshots = handle.subscribe();
    let mut emergency_pending = cli.emergency_at;
    let mut optimize_pending = cli.optimize_at;
    let mut last_reported = 0;

    handle.send(Command::Start).await?;

    loop {
        let tick = snapshots.borrow_and_update().tick;
        if tick >= cli.ticks {
            break;
        }
        if emergency_pending.is_some_and(|at| tick >= at) {
            handle.send(Command::ToggleEmergency).await?;
            emergency_pending = None;
        }
        if optimize_pending.is_some_and(|at| tick >= at) {
            handle.send(Command::TriggerOptimization).await?;
            optimize_pending = None;
        }
        if cli.summary_every > 0 && tick / cli.summary_every > last_reported {
            last_reported = tick / cli.summary_every;
            let snapshot = handle.snapshot();
            info!(
                "Tick {}: {} vehicles, avg wait {:.2}s, throughput {}",
                snapshot.tick,
                snapshot.stats.total_cars,
                snapshot.stats.average_wait_time,
                snapshot.stats.vehicle_throughput
            );
        }
        snapshots
            .changed()
            .await
            .context("simulation stopped unexpectedly")?;
    }

    handle.send(Command::Pause).await?;
    handle.send(Command::Shutdown).await?;
    task.await.context("simulation task panicked")
}

fn report(world: &SimWorld, cli: &Cli) -> Result<()> {
    let stats = world.stats();
    info!("=== SIMULATION COMPLETE ===");
    info!("Ticks: {}", world.current_tick());
    info!("Active vehicles: {}", stats.total_cars);
    info!("Throughput: {}", stats.vehicle_throughput);
    info!("Average wait: {:.2}s", stats.average_wait_time);

    if cli.json {
        let json = serde_json::to_string_pretty(&world.snapshot())
            .context("failed to serialize world snapshot")?;
        println!("{}", json);
        return Ok(());
    }

    println!("=== Final State ===");
    world.print_summary();
    if cli.map {
        world.draw_map();
    }
    if let Some(explanation) = world.latest_explanation() {
        println!();
        println!("{}", explanation.text);
    }
    Ok(())
}
