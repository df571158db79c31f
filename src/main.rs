//! rig-recorder - camera recording for behavioural rigs
//!
//! Subcommands:
//! - `rig-recorder run` - keep the camera live and record on operator command
//! - `rig-recorder cameras` - list cameras for a backend
//! - `rig-recorder next-name` - print the next two-photon style output name

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rig_recorder::capture::simulated::SimulatedCamera;
use rig_recorder::capture::{Camera, CameraSession, TriggerSelector};
use rig_recorder::commands::OperatorConsole;
use rig_recorder::config::{CameraBackend, RigConfig, StartMode};
use rig_recorder::output::FfmpegAviSink;
use rig_recorder::recorder::{next_sequence_name, RecordingCoordinator};
use rig_recorder::utils::init_tracing;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rig-recorder")]
#[command(about = "Free-run and TTL-triggered camera recording")]
#[command(version)]
struct Cli {
    /// Config file (default: ./rig-recorder.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the camera and serve operator commands (t, r, q, h)
    Run(RunArgs),

    /// List cameras
    Cameras {
        #[arg(long, value_enum)]
        camera: Option<BackendArg>,
    },

    /// Print the next output name without recording
    NextName {
        /// Destination directory
        #[arg(long)]
        dest: PathBuf,

        /// Base name; a name ending in A## continues that series
        #[arg(long)]
        prefix: String,

        #[arg(long, default_value = "avi")]
        ext: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Destination directory for saved videos
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Base filename prefix; A01, A02, ... is appended
    #[arg(long)]
    prefix: Option<String>,

    /// Free-run recording duration in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Nominal frame rate for the output video
    #[arg(long)]
    fps: Option<f64>,

    /// Start mode; in free mode the trigger can still be armed with `t`
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Trigger input line
    #[arg(long)]
    trigger_line: Option<String>,

    #[arg(long, value_enum)]
    trigger_selector: Option<SelectorArg>,

    /// Pixel format, e.g. Mono8, Mono16, RGB8
    #[arg(long)]
    pixel_format: Option<String>,

    #[arg(long)]
    exposure_us: Option<f64>,

    #[arg(long)]
    gain_db: Option<f64>,

    /// Frame grab timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Keep recording after the trigger line goes low
    #[arg(long)]
    no_stop_on_falling: bool,

    /// Safety cap for triggered recordings, in seconds
    #[arg(long)]
    max_triggered_s: Option<f64>,

    /// Do not arm a hardware AcquisitionStop on the falling edge
    #[arg(long)]
    no_acq_stop: bool,

    #[arg(long, value_enum)]
    camera: Option<BackendArg>,

    /// Webcam device index
    #[arg(long)]
    device: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Simulated,
    Webcam,
}

impl From<BackendArg> for CameraBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Simulated => CameraBackend::Simulated,
            BackendArg::Webcam => CameraBackend::Webcam,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Free,
    Trigger,
}

#[derive(Clone, Copy, ValueEnum)]
enum SelectorArg {
    AcquisitionStart,
    FrameStart,
}

impl RunArgs {
    fn apply(self, config: &mut RigConfig) {
        if let Some(dest) = self.dest {
            config.output.dest = dest;
        }
        if let Some(prefix) = self.prefix {
            config.output.prefix = prefix;
        }
        if let Some(duration) = self.duration {
            config.capture.duration_s = duration;
        }
        if let Some(fps) = self.fps {
            config.capture.fps = fps;
        }
        if let Some(mode) = self.mode {
            config.trigger.mode = match mode {
                ModeArg::Free => StartMode::Free,
                ModeArg::Trigger => StartMode::Trigger,
            };
        }
        if let Some(line) = self.trigger_line {
            config.trigger.line = line;
        }
        if let Some(selector) = self.trigger_selector {
            config.trigger.selector = match selector {
                SelectorArg::AcquisitionStart => TriggerSelector::AcquisitionStart,
                SelectorArg::FrameStart => TriggerSelector::FrameStart,
            };
        }
        if let Some(pixel_format) = self.pixel_format {
            config.capture.pixel_format = pixel_format;
        }
        if self.exposure_us.is_some() {
            config.capture.exposure_us = self.exposure_us;
        }
        if self.gain_db.is_some() {
            config.capture.gain_db = self.gain_db;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.capture.timeout_ms = timeout_ms;
        }
        if self.no_stop_on_falling {
            config.trigger.stop_on_falling = false;
        }
        if self.max_triggered_s.is_some() {
            config.trigger.max_triggered_s = self.max_triggered_s;
        }
        if self.no_acq_stop {
            config.trigger.use_acquisition_stop = false;
        }
        if let Some(camera) = self.camera {
            config.capture.camera = camera.into();
        }
        if let Some(device) = self.device {
            config.capture.device = device;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, source) = RigConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config);
            init_tracing(config.logging.filter.as_deref());
            if let Some(path) = source {
                tracing::info!("Loaded config from {}", path.display());
            }
            config.validate()?;
            run(&config)
        }
        Commands::Cameras { camera } => {
            init_tracing(config.logging.filter.as_deref());
            let backend = camera.map(CameraBackend::from).unwrap_or(config.capture.camera);
            list_cameras(backend, &config)
        }
        Commands::NextName { dest, prefix, ext } => {
            let name = next_sequence_name(&dest, &prefix, &ext)
                .with_context(|| format!("Cannot scan {}", dest.display()))?;
            println!("{}", name.path.display());
            Ok(())
        }
    }
}

fn run(config: &RigConfig) -> Result<()> {
    tracing::info!("Starting rig-recorder v{}", env!("CARGO_PKG_VERSION"));

    let camera = build_camera(config)?;
    let session = CameraSession::open(camera, config.camera_settings()?)
        .context("Failed to open camera")?;
    let sink = FfmpegAviSink::with_program(config.output.ffmpeg.clone());
    let coordinator = RecordingCoordinator::new(session, Box::new(sink), config.recorder_config());

    let mut console = OperatorConsole::new(coordinator, config.free_run_mode(), config.triggered_mode());
    let start_armed = config.trigger.mode == StartMode::Trigger;
    let sessions = console.run(BufReader::new(std::io::stdin()), start_armed);

    let frames: u64 = sessions.iter().map(|s| s.frames_written).sum();
    tracing::info!("{} recordings, {} frames", sessions.len(), frames);
    Ok(())
}

fn build_camera(config: &RigConfig) -> Result<Box<dyn Camera>> {
    match config.capture.camera {
        CameraBackend::Simulated => {
            let sim = &config.simulated;
            let camera = SimulatedCamera::generated(sim.width, sim.height, config.capture.fps).with_trigger_pulse(
                Duration::from_millis(sim.trigger_delay_ms),
                Duration::from_millis(sim.trigger_width_ms),
            );
            Ok(Box::new(camera))
        }
        #[cfg(feature = "webcam")]
        CameraBackend::Webcam => {
            let camera = rig_recorder::capture::webcam::WebcamCamera::new(Some(config.capture.device.to_string()));
            Ok(Box::new(camera))
        }
        #[cfg(not(feature = "webcam"))]
        CameraBackend::Webcam => anyhow::bail!("built without the `webcam` feature"),
    }
}

fn list_cameras(backend: CameraBackend, config: &RigConfig) -> Result<()> {
    let cameras = match backend {
        CameraBackend::Simulated => vec![build_camera(config)?.info()],
        #[cfg(feature = "webcam")]
        CameraBackend::Webcam => rig_recorder::capture::webcam::list_cameras(),
        #[cfg(not(feature = "webcam"))]
        CameraBackend::Webcam => anyhow::bail!("built without the `webcam` feature"),
    };

    if cameras.is_empty() {
        println!("No cameras found");
    }
    for camera in cameras {
        let trigger = if camera.has_trigger_line { "trigger line" } else { "no trigger line" };
        println!("{}\t{}\t{} ({})", camera.id, camera.name, camera.backend, trigger);
    }
    Ok(())
}
