//! Sandbox Projector
//!
//! Entry point: calibrate against a recorded or live frame source, then
//! render the height map for every frame.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{Receiver, Sender};
use sandbox_projector::calibration::{ChannelFeedback, FeedbackSender};
use sandbox_projector::camera::ReplaySource;
use sandbox_projector::config::{load_config, CalibrationStrategy, SandboxConfig, TemporalMode};
use sandbox_projector::depth::ColorProfiles;
use sandbox_projector::export::{output_path, FrameExporter, TransformRecord};
use sandbox_projector::pipeline::{startup, Pipeline};
use sandbox_projector::treasure::TreasureHunt;
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CalibrationArg {
    Manual,
    Marker,
    Corners,
}

impl From<CalibrationArg> for CalibrationStrategy {
    fn from(arg: CalibrationArg) -> Self {
        match arg {
            CalibrationArg::Manual => CalibrationStrategy::Manual,
            CalibrationArg::Marker => CalibrationStrategy::MarkerSequence,
            CalibrationArg::Corners => CalibrationStrategy::CornerCluster,
        }
    }
}

#[derive(Parser)]
#[command(name = "sandbox")]
#[command(version, about = "Augmented reality sandbox projector", long_about = None)]
struct Cli {
    /// Directory of recorded `<n>_color.png` / `<n>_depth.png` frames
    #[arg(long, value_name = "DIR")]
    replay: PathBuf,

    /// Configuration file (.json or .xml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum sand depth below the sand level in mm
    #[arg(long, value_name = "MM")]
    depth: Option<u16>,

    /// Maximum sand height above the sand level in mm
    #[arg(long, value_name = "MM")]
    top: Option<u16>,

    /// Sand level distance from the camera in mm, -1 to estimate
    #[arg(long, value_name = "MM", allow_hyphen_values = true)]
    ground: Option<i32>,

    /// Color band prefix, loads <PREFIX>0.png to <PREFIX>9.png
    #[arg(long, value_name = "PREFIX")]
    colors: Option<String>,

    /// Calibration strategy, repeat to set the order
    #[arg(long, value_enum)]
    calibration: Vec<CalibrationArg>,

    /// Frames averaged per output frame
    #[arg(long, value_name = "N")]
    averaging_depth: Option<usize>,

    /// Stride between averaged frames
    #[arg(long, value_name = "N", default_value = "1")]
    averaging_stepsize: usize,

    /// Frames in the median filter
    #[arg(long, value_name = "N")]
    median_depth: Option<usize>,

    /// Stride between median filtered frames
    #[arg(long, value_name = "N", default_value = "1")]
    median_stepsize: usize,

    /// Treasure image for the treasure hunt
    #[arg(long, value_name = "PNG")]
    treasure: Option<PathBuf>,

    /// Projector resolution
    #[arg(long, value_name = "WxH")]
    display: Option<String>,

    /// Manual calibration click in camera pixels, repeat for each corner
    #[arg(long, value_name = "X,Y")]
    click: Vec<String>,

    /// Directory for rendered output frames and the transform
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    frames: Option<u64>,
}

/// Commands read from stdin while running.
#[derive(Debug, Clone, Copy)]
enum Command {
    Profile(usize),
    Rehide,
    Quit,
}

fn parse_pair<T: std::str::FromStr>(value: &str, separator: char) -> Option<(T, T)> {
    let (a, b) = value.split_once(separator)?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

fn build_config(cli: &Cli) -> anyhow::Result<SandboxConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SandboxConfig::default(),
    };

    if let Some(depth) = cli.depth {
        config.max_sand_depth = depth;
    }
    if let Some(top) = cli.top {
        config.max_sand_height = top;
    }
    if let Some(ground) = cli.ground {
        config.manual_sand_plane_distance = ground;
    }
    if !cli.calibration.is_empty() {
        config.calibration_order = cli.calibration.iter().map(|&c| c.into()).collect();
    }
    if let Some(display) = &cli.display {
        let Some((width, height)) = parse_pair(display, 'x') else {
            bail!("Invalid display size {}, expected WxH", display);
        };
        config.display_width = width;
        config.display_height = height;
    }

    if let Some(depth) = cli.averaging_depth {
        config.temporal.mode = TemporalMode::Average;
        config.temporal.depth = depth;
        config.temporal.stride = cli.averaging_stepsize;
    }
    if let Some(depth) = cli.median_depth {
        if cli.averaging_depth.is_some() {
            log::warn!("Averaging and median filter both requested, median filter disabled");
        } else {
            config.temporal.mode = TemporalMode::Median;
            config.temporal.depth = depth;
            config.temporal.stride = cli.median_stepsize;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Forward stdin lines: `x,y` clicks, `q` aborts or quits, a digit selects a
/// color profile and `t` hides the treasure again.
fn spawn_input(feedback: FeedbackSender, commands: Sender<Command>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();

            if let Some((x, y)) = parse_pair::<f64>(line, ',') {
                feedback.click(x, y);
                continue;
            }

            let command = match line {
                "q" => {
                    feedback.abort();
                    Command::Quit
                }
                "t" => Command::Rehide,
                digit => match digit.parse::<usize>() {
                    Ok(n) => Command::Profile(n),
                    Err(_) => {
                        log::warn!("Unknown command {:?}", line);
                        continue;
                    }
                },
            };
            if commands.send(command).is_err() {
                break;
            }
        }
    });
}

/// Drop commands typed while calibrating. Returns how many were dropped.
fn discard_pending(commands: &Receiver<Command>) -> usize {
    let dropped = commands.try_iter().count();
    if dropped > 0 {
        log::debug!("Discarded {} command(s) entered during calibration", dropped);
    }
    dropped
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    log::info!("Sandbox projector starting...");

    let mut source = ReplaySource::open(&cli.replay)
        .with_context(|| format!("Failed to open recording {}", cli.replay.display()))?;

    let (mut sink, feedback) = ChannelFeedback::new();
    for click in &cli.click {
        let Some((x, y)) = parse_pair::<f64>(click, ',') else {
            bail!("Invalid click {}, expected X,Y", click);
        };
        feedback.click(x, y);
    }
    let (command_tx, command_rx): (Sender<Command>, Receiver<Command>) =
        crossbeam_channel::unbounded();
    spawn_input(feedback.clone(), command_tx);

    let (calibration, baseline) = startup(&config, &mut source, &mut sink)?;
    drop(feedback);
    discard_pending(&command_rx);
    log::info!("Calibrated with the {} strategy", calibration.strategy);

    let mut pipeline = Pipeline::new(&config, calibration.transform.clone(), baseline)?;
    if let Some(prefix) = &cli.colors {
        let profiles = ColorProfiles::load_prefix(prefix, baseline.range())?;
        pipeline = pipeline.with_color_profiles(profiles);
    }
    if let Some(path) = &cli.treasure {
        let hunt = TreasureHunt::load(path, config.display_width, config.display_height)?;
        pipeline = pipeline.with_treasure(hunt);
    }

    if let Some(dir) = &cli.output {
        std::fs::create_dir_all(dir)?;
        let record =
            TransformRecord::new(&calibration.transform, config.display_width, config.display_height);
        FrameExporter::export_transform_json(&record, &dir.join("transform.json"))?;
    }

    let processed = pipeline.run(&mut source, cli.frames, |pipeline, index, output| {
        for command in command_rx.try_iter() {
            match command {
                Command::Profile(n) => {
                    if !pipeline.select_color_band(n) {
                        log::warn!("No color profile {}", n);
                    }
                }
                Command::Rehide => pipeline.rehide_treasure(),
                Command::Quit => return Ok(ControlFlow::Break(())),
            }
        }

        if let Some(dir) = &cli.output {
            FrameExporter::export_output(output, &output_path(dir, index))?;
        }
        Ok(ControlFlow::Continue(()))
    })?;

    log::info!("Sandbox projector exiting after {} frame(s)", processed);
    Ok(())
}
