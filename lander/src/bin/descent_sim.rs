use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gnc::ControllerMode;
use indicatif::{ProgressBar, ProgressStyle};
use lander::config::{LanderConfig, CONFIG_NAME};
use lander::sim::WorldConfig;
use lander::Mission;
use shared::config_storage::{load_json, ConfigStorage};
use shared::telemetry::FileTelemetrySink;

/// Command line arguments for the descent simulation
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Headless asteroid descent with vision rotation estimation",
    long_about = "Runs the lander control unit against a rotating spherical asteroid.\n\n\
        The lander hovers above the surface while the nadir camera images the \
        asteroid and the vision estimator measures its spin. Once the estimate is \
        final, guidance waits for the landing site to rotate under the lander and \
        flies a ZEM-ZEV descent.\n\n\
        Telemetry is written as one log file per channel (parameters, estimation, \
        thrust, pre_approach) into the output directory."
)]
struct Args {
    #[arg(
        short,
        long,
        default_value_t = 600.0,
        help = "Maximum simulated duration in seconds",
        long_help = "Upper bound on simulated time. The run ends earlier if the lander \
            reaches the surface."
    )]
    duration: f64,

    #[arg(
        long,
        default_value_t = 0.1,
        help = "Physics step in seconds",
        long_help = "Fixed integration step of the physics world. The control unit is \
            ticked once per step; imaging and guidance fire on their own periods."
    )]
    dt: f64,

    #[arg(
        short,
        long,
        help = "Output directory for telemetry logs",
        long_help = "Directory receiving the telemetry log files. Defaults to \
            'descent_<timestamp>' in the current directory."
    )]
    output: Option<PathBuf>,

    #[arg(
        short,
        long,
        help = "Load the configuration from a JSON file",
        long_help = "Path to a LanderConfig JSON document. Without it the stored \
            configuration (~/.lander_config/lander_config.json) is used, falling \
            back to built-in defaults."
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        help = "Save the effective configuration to the config store",
        long_help = "Write the configuration used for this run, including command line \
            overrides, to ~/.lander_config/lander_config.json."
    )]
    save_config: bool,

    #[arg(
        long,
        help = "Guidance uses only the estimated rotation and landing site"
    )]
    estimate_only: bool,

    #[arg(
        long,
        help = "Fly the station-keeping autopilot instead of guidance"
    )]
    autopilot: bool,

    #[arg(
        long,
        default_value_t = 0.002,
        help = "Asteroid spin rate about +y in rad/s"
    )]
    spin: f64,

    #[arg(
        long,
        default_value_t = 1,
        help = "Seed of the procedural surface texture"
    )]
    texture_seed: u64,

    #[arg(
        long,
        help = "Dump every captured frame as PNG into <output>/frames"
    )]
    dump_frames: bool,

    #[arg(
        long,
        help = "Let the vision worker run concurrently instead of in lock-step",
        long_help = "By default the simulation waits for the vision worker after each \
            tick so that results are reproducible. With this flag frames that arrive \
            while the worker is busy are dropped, as they would be in real time."
    )]
    free_running: bool,
}

fn load_config(args: &Args) -> Result<LanderConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => load_json(path)?,
        None => match ConfigStorage::new() {
            Ok(storage) => LanderConfig::load(&storage)?,
            Err(e) => {
                log::warn!("No config store available ({e}), using defaults");
                LanderConfig::default()
            }
        },
    };
    if args.estimate_only {
        config.control.use_estimate_only = true;
    }
    if args.autopilot {
        config.control.mode = ControllerMode::Autopilot;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config(&args)?;
    if args.save_config {
        let path = config.save(&ConfigStorage::new()?)?;
        println!("Saved {CONFIG_NAME} to {}", path.display());
    }

    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "descent_{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ))
    });
    std::fs::create_dir_all(&output)?;
    let telemetry = Arc::new(FileTelemetrySink::new(&output)?);

    let world = WorldConfig {
        angular_velocity: nalgebra::Vector3::new(0.0, args.spin, 0.0),
        ..Default::default()
    };

    println!("Asteroid Descent Simulation");
    println!("===========================");
    println!("Duration: {} s (dt = {} s)", args.duration, args.dt);
    println!("Spin: {} rad/s about +y", args.spin);
    println!("Mode: {:?}, estimate only: {}", config.control.mode, config.control.use_estimate_only);
    println!("Telemetry: {}", output.display());

    let mut mission = Mission::new(&config, world, args.dt, args.texture_seed, telemetry.clone())?;
    mission.set_lockstep_vision(!args.free_running);
    if args.dump_frames {
        let frames = output.join("frames");
        std::fs::create_dir_all(&frames)?;
        mission.unit_mut().enable_frame_dumps(frames);
    }

    let total_steps = (args.duration / args.dt).ceil() as u64;
    let progress = ProgressBar::new(total_steps);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} steps ({msg})")?
            .progress_chars("#>-"),
    );

    for _ in 0..total_steps {
        if !mission.step()? {
            break;
        }
        progress.inc(1);
        progress.set_message(format!("{:?}", mission.unit().guidance().phase()));
    }
    progress.finish_and_clear();

    let summary = mission.summary()?;
    telemetry.flush()?;

    println!();
    println!("Elapsed: {:.1} s, final phase {:?}", summary.elapsed, summary.phase);
    println!(
        "Measured samples: {}, estimate: {:?}, truth: {:?}",
        summary.measured_samples,
        summary.angular_velocity_estimate.map(|v| (v.x, v.y, v.z)),
        (
            summary.angular_velocity_truth.x,
            summary.angular_velocity_truth.y,
            summary.angular_velocity_truth.z
        )
    );
    match summary.touchdown {
        Some(touchdown) => println!(
            "Touchdown at t={:.1} s: relative speed {:.3} m/s, {:.2} m from the site",
            touchdown.time,
            touchdown.relative_velocity.norm(),
            touchdown.site_distance
        ),
        None => println!("No touchdown within the simulated duration"),
    }

    Ok(())
}
